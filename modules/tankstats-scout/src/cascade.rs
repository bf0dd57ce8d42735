// Retrieval cascade: try each source in order until the mapped stats are
// usable. A later tier only replaces the running candidate when its own
// result is valid, so the candidate never gets worse.
//
// Error policy by position: the first tier's error aborts the account (the
// page could not be fetched at all), a middle tier's error escalates to the
// next tier, and the last tier's error aborts again since nothing is left.

use anyhow::{Context, Result};
use tankstats_common::PlayerStats;
use tracing::{debug, info, warn};

use crate::mapper::map_stats;
use crate::traits::{ProfileSource, ProfileTarget, RawProfile, Tier};
use crate::validity::is_invalid;

/// Result of one cascade run.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    pub stats: PlayerStats,
    /// Tier that produced `stats`; `None` if no tier produced anything.
    pub tier: Option<Tier>,
    /// Every tier that was invoked, in order.
    pub attempted: Vec<Tier>,
}

pub struct Cascade {
    sources: Vec<Box<dyn ProfileSource>>,
}

impl Cascade {
    pub fn new(sources: Vec<Box<dyn ProfileSource>>) -> Self {
        Self { sources }
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.sources.iter().map(|s| s.tier()).collect()
    }

    pub async fn run(&self, target: &ProfileTarget) -> Result<CascadeOutcome> {
        let mut best: Option<(PlayerStats, Tier)> = None;
        let mut attempted = Vec::new();
        let last = self.sources.len().saturating_sub(1);

        for (i, source) in self.sources.iter().enumerate() {
            if best.as_ref().is_some_and(|(stats, _)| !is_invalid(stats)) {
                break;
            }

            let tier = source.tier();
            attempted.push(tier);
            debug!(account_id = target.account_id, %tier, "cascade: trying tier");

            let raw = match source.fetch(target).await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!(account_id = target.account_id, %tier, "cascade: tier returned nothing");
                    continue;
                }
                Err(e) if i == 0 || i == last => {
                    return Err(e).with_context(|| format!("{tier} fetch failed"));
                }
                Err(e) => {
                    warn!(account_id = target.account_id, %tier, error = %format!("{e:#}"), "cascade: tier failed, escalating");
                    continue;
                }
            };

            let candidate = map_candidate(raw, best.as_ref().map(|(s, _)| s), target);
            let valid = !is_invalid(&candidate);
            info!(
                account_id = target.account_id,
                %tier,
                valid,
                battles = candidate.battles,
                global_rating = candidate.global_rating,
                avg_dmg = candidate.avg_dmg,
                "cascade: tier mapped"
            );

            if best.is_none() || valid {
                best = Some((candidate, tier));
            }
        }

        Ok(match best {
            Some((stats, tier)) => CascadeOutcome {
                stats,
                tier: Some(tier),
                attempted,
            },
            None => CascadeOutcome {
                stats: PlayerStats {
                    nickname: target.nickname.clone(),
                    ..PlayerStats::default()
                },
                tier: None,
                attempted,
            },
        })
    }
}

/// Map a tier's raw output. The nickname comes from the page when the tier
/// found one, else from the best candidate so far, else from the job.
fn map_candidate(raw: RawProfile, best: Option<&PlayerStats>, target: &ProfileTarget) -> PlayerStats {
    let nickname = raw
        .nickname
        .or_else(|| best.and_then(|s| s.nickname.clone()))
        .or_else(|| target.nickname.clone());
    map_stats(&raw.labels, nickname.as_deref(), raw.fallback_text.as_deref())
}
