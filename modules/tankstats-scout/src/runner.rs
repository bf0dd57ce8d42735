// Sequential run over the job list: cascade each account, keep only good
// records, then rebuild the index from the previous one plus this run's
// updates.

use std::ops::Range;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use tankstats_common::{Config, Job, PlayerRecord};
use tracing::{info, warn};

use crate::cascade::Cascade;
use crate::store::{merge_index, StatsStore};
use crate::traits::ProfileTarget;
use crate::validity::is_good;

/// Pause between accounts: a fixed base plus uniform jitter.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub base: Duration,
    /// Jitter range in seconds.
    pub jitter: Range<f64>,
}

impl Pacing {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            jitter: 0.5..1.2,
        }
    }

    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            jitter: 0.0..0.0,
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.jitter.is_empty() {
            0.0
        } else {
            rand::rng().random_range(self.jitter.clone())
        };
        self.base + Duration::from_secs_f64(jitter)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub updated: usize,
    pub kept_previous: usize,
    pub failed: usize,
}

/// What happened to one account's stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Updated,
    KeptPrevious,
    Failed,
}

pub struct Runner {
    cascade: Cascade,
    store: StatsStore,
    config: Config,
    pacing: Pacing,
}

impl Runner {
    pub fn new(cascade: Cascade, store: StatsStore, config: Config, pacing: Pacing) -> Self {
        Self {
            cascade,
            store,
            config,
            pacing,
        }
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    pub fn target_for(&self, job: &Job) -> ProfileTarget {
        ProfileTarget {
            account_id: job.id,
            nickname: job.name.clone(),
            url: self.config.profile_url(job.id, job.name.as_deref()),
        }
    }

    /// Scrape one account. Cascade failures are folded into the record's
    /// `error` rather than returned.
    pub async fn scrape_one(&self, job: &Job) -> PlayerRecord {
        let target = self.target_for(job);
        match self.cascade.run(&target).await {
            Ok(outcome) => {
                info!(
                    account_id = job.id,
                    tier = outcome.tier.map(|t| t.as_str()).unwrap_or("none"),
                    attempted = outcome.attempted.len(),
                    "Cascade finished"
                );
                PlayerRecord::new(job.id, outcome.stats, Utc::now())
            }
            Err(e) => PlayerRecord::failed(job.id, job.name.clone(), format!("{e:#}"), Utc::now()),
        }
    }

    /// Persist a record if it is good; otherwise leave any stored file alone.
    pub fn settle(&self, record: &PlayerRecord) -> Disposition {
        if is_good(record) {
            match self.store.save_player(record) {
                Ok(_) => return Disposition::Updated,
                Err(e) => {
                    warn!(account_id = record.account_id, error = %e, "ERR: could not write record");
                    return Disposition::Failed;
                }
            }
        }

        if self.store.has_player(record.account_id) {
            info!(account_id = record.account_id, "SKIP: keep previous stats");
            Disposition::KeptPrevious
        } else {
            let reason = record.error.as_deref().unwrap_or("invalid stats");
            warn!(account_id = record.account_id, "ERR: {reason}");
            Disposition::Failed
        }
    }

    pub async fn run(&self, jobs: &[Job]) -> Result<RunSummary> {
        let previous = self.store.load_index();
        let mut updated = Vec::new();
        let mut summary = RunSummary::default();
        let total = jobs.len();

        for (i, job) in jobs.iter().enumerate() {
            info!(account_id = job.id, name = job.name.as_deref().unwrap_or(""), "[{}/{}] scraping", i + 1, total);

            let record = self.scrape_one(job).await;
            match self.settle(&record) {
                Disposition::Updated => {
                    info!(
                        account_id = record.account_id,
                        battles = record.stats.battles,
                        win_rate = record.stats.win_rate,
                        avg_dmg = record.stats.avg_dmg,
                        global_rating = record.stats.global_rating,
                        "OK"
                    );
                    summary.updated += 1;
                    updated.push(record);
                }
                Disposition::KeptPrevious => summary.kept_previous += 1,
                Disposition::Failed => summary.failed += 1,
            }

            if i + 1 < total {
                tokio::time::sleep(self.pacing.next_delay()).await;
            }
        }

        let players = merge_index(previous, &updated).context("Failed to build index")?;
        let count = players.len();
        let path = self
            .store
            .save_index(players, Utc::now())
            .context("Failed to write index")?;
        info!(path = %path.display(), players = count, "Index written");

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_stays_in_range() {
        let pacing = Pacing::new(Duration::from_millis(1200));
        for _ in 0..50 {
            let d = pacing.next_delay();
            assert!(d >= Duration::from_millis(1700), "{d:?}");
            assert!(d < Duration::from_millis(2400), "{d:?}");
        }
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }
}
