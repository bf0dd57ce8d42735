// Output directory: one `<accountId>.json` per player plus `index.json`.
//
// Every write goes to a temp file in the same directory and is renamed into
// place, so a crash never leaves a truncated record or index behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tankstats_common::{IndexFile, PlayerRecord, TankStatsError};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.json";

pub struct StatsStore {
    dir: PathBuf,
}

impl StatsStore {
    /// Open the output directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TankStatsError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn player_path(&self, account_id: u64) -> PathBuf {
        self.dir.join(format!("{account_id}.json"))
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn has_player(&self, account_id: u64) -> bool {
        self.player_path(account_id).is_file()
    }

    pub fn save_player(&self, record: &PlayerRecord) -> Result<PathBuf, TankStatsError> {
        let path = self.player_path(record.account_id);
        write_json_atomic(&self.dir, &path, record)?;
        debug!(account_id = record.account_id, path = %path.display(), "store: record written");
        Ok(path)
    }

    /// Previous index entries keyed by account id. A missing index is empty;
    /// an unreadable one is logged and treated as empty.
    pub fn load_index(&self) -> BTreeMap<u64, Value> {
        let path = self.index_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store: previous index unreadable");
                return BTreeMap::new();
            }
        };

        // Only `players` matters here; the header is rewritten every run.
        let players = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(mut root)) => match root.remove("players") {
                Some(Value::Array(players)) => players,
                _ => {
                    warn!(path = %path.display(), "store: previous index has no players array, starting fresh");
                    return BTreeMap::new();
                }
            },
            Ok(_) => {
                warn!(path = %path.display(), "store: previous index is not an object, starting fresh");
                return BTreeMap::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store: previous index malformed, starting fresh");
                return BTreeMap::new();
            }
        };

        players
            .into_iter()
            .filter_map(|entry| Some((entry_account_id(&entry)?, entry)))
            .collect()
    }

    pub fn save_index(&self, players: Vec<Value>, generated_at: DateTime<Utc>) -> Result<PathBuf, TankStatsError> {
        let path = self.index_path();
        let index = IndexFile {
            generated_at,
            players,
        };
        write_json_atomic(&self.dir, &path, &index)?;
        Ok(path)
    }
}

/// Union of the previous index and this run's updated records, the latter
/// winning by id, sorted ascending by id. Entries not updated are passed
/// through untouched.
pub fn merge_index(
    mut previous: BTreeMap<u64, Value>,
    updated: &[PlayerRecord],
) -> Result<Vec<Value>, TankStatsError> {
    for record in updated {
        previous.insert(record.account_id, serde_json::to_value(record)?);
    }
    Ok(previous.into_values().collect())
}

/// `accountId` as a number or a numeric string.
fn entry_account_id(entry: &Value) -> Option<u64> {
    match entry.get("accountId")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn write_json_atomic<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<(), TankStatsError> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
