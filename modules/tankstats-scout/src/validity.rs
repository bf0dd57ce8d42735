// Usability check for mapped stats: gates tier escalation and write-back.

use tankstats_common::{PlayerRecord, PlayerStats};

/// Invalid when at least two of {battles, global_rating, avg_dmg} are zero.
///
/// One zero is tolerated: a fresh account can legitimately have no rating yet.
pub fn is_invalid(stats: &PlayerStats) -> bool {
    let zeros = [stats.battles, stats.global_rating, stats.avg_dmg]
        .iter()
        .filter(|&&v| v == 0)
        .count();
    zeros >= 2
}

/// May this record replace what is on disk?
pub fn is_good(record: &PlayerRecord) -> bool {
    record.error.is_none() && !is_invalid(&record.stats)
}
