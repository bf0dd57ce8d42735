// Job list sources: a participants file, profile URLs, or bare ids.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tankstats_common::{Job, TankStatsError};
use tracing::warn;

static TOKEN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,|\s]\s*").expect("valid regex"));

/// Load jobs from a `.json` array of `{id, name?}` or from a text file with
/// one `id [name]` per line.
pub fn load_participants(path: &Path) -> Result<Vec<Job>, TankStatsError> {
    let raw = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Ok(serde_json::from_str(&raw)?)
    } else {
        parse_participants_text(&raw)
    }
}

/// Text form: `#` comments and blank lines skipped; tokens split on
/// `; , |` or whitespace; first token is the id, second the name.
pub fn parse_participants_text(raw: &str) -> Result<Vec<Job>, TankStatsError> {
    let mut jobs = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = TOKEN_SEPARATOR.split(line).filter(|t| !t.is_empty());
        let Some(first) = tokens.next() else { continue };
        let id = first.parse::<u64>().map_err(|_| {
            TankStatsError::InvalidInput(format!("line {}: bad account id {first:?}", lineno + 1))
        })?;
        let name = tokens.next().map(str::to_string);
        jobs.push(Job { id, name });
    }
    Ok(jobs)
}

/// Job from a profile URL whose last path segment is `<id>-<name>` or `<id>`.
pub fn job_from_url(raw: &str) -> Option<Job> {
    let parsed = url::Url::parse(raw).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;

    let (id, name) = match segment.split_once('-') {
        Some((id, name)) if !name.is_empty() => (id, Some(name.to_string())),
        Some((id, _)) => (id, None),
        None => (segment, None),
    };
    Some(Job {
        id: id.parse().ok()?,
        name,
    })
}

/// Jobs from `--url` arguments; unparsable ones are skipped with a warning.
pub fn jobs_from_urls<'a>(urls: impl IntoIterator<Item = &'a str>) -> Vec<Job> {
    urls.into_iter()
        .filter_map(|u| {
            let job = job_from_url(u);
            if job.is_none() {
                warn!(url = u, "participants: cannot derive account id from URL, skipping");
            }
            job
        })
        .collect()
}

/// One job per id. The first occurrence fixes the position; a later one
/// that carries a name replaces the name.
pub fn dedup_jobs(jobs: Vec<Job>) -> Vec<Job> {
    let mut slot: HashMap<u64, usize> = HashMap::new();
    let mut out: Vec<Job> = Vec::with_capacity(jobs.len());
    for job in jobs {
        match slot.get(&job.id) {
            Some(&i) => {
                if job.name.is_some() {
                    out[i].name = job.name;
                }
            }
            None => {
                slot.insert(job.id, out.len());
                out.push(job);
            }
        }
    }
    out
}
