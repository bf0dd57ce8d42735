use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One participant to scrape: account id plus an optional nickname used to
/// build the profile slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Typed statistics mapped from one retrieval attempt.
///
/// `battles`, `avg_dmg` and `global_rating` use 0 for "unknown"; every other
/// field is `None` when the page did not yield it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStats {
    pub nickname: Option<String>,
    pub battles: u64,
    pub wins: Option<u64>,
    pub win_rate: Option<f64>,
    pub avg_dmg: u64,
    pub avg_frags: Option<f64>,
    pub survive_rate: Option<f64>,
    pub hits_percents: Option<f64>,
    #[serde(rename = "global_rating")]
    pub global_rating: u64,
    pub avg_exp: Option<u64>,
    pub max_exp: Option<u64>,
    pub max_frags: Option<u64>,
    pub master_count: Option<u64>,
    pub vehicles_count: Option<u64>,
}

/// The persisted per-account record (`<accountId>.json` and index entries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub account_id: u64,
    #[serde(flatten)]
    pub stats: PlayerStats,
    #[serde(with = "iso_seconds")]
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlayerRecord {
    pub fn new(account_id: u64, stats: PlayerStats, fetched_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            stats,
            fetched_at,
            error: None,
        }
    }

    /// A record for an account whose extraction failed outright. Stats stay
    /// at their defaults, apart from the nickname the job supplied.
    pub fn failed(account_id: u64, nickname: Option<String>, error: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            stats: PlayerStats {
                nickname,
                ..PlayerStats::default()
            },
            fetched_at,
            error: Some(error),
        }
    }
}

/// `index.json`. Players are kept as raw JSON objects so entries carried over
/// from a previous run keep their keys, key order and values. Number literals
/// are re-rendered in serde_json's canonical form (`55.50` → `55.5`,
/// `1e2` → `100.0`), so only entries this tool wrote round-trip byte for byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    #[serde(with = "iso_seconds")]
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub players: Vec<serde_json::Value>,
}

/// Render a timestamp the way every file in the output directory does:
/// RFC 3339, whole seconds, `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serde adapter for second-precision UTC timestamps.
pub mod iso_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
