// Label→value mapping to typed PlayerStats.
//
// Structured labels are read first; when fallback text is available, any
// field still at its default is re-tried with the pattern extractor.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tankstats_common::PlayerStats;

use crate::normalize::{canonicalize_label, parse_integer, parse_number};
use crate::patterns::{self, PatternField};

const RATING_LABELS: &[&str] = &["личный рейтинг"];
const WIN_RATE_LABELS: &[&str] = &["победы", "процент побед"];
const BATTLES_LABELS: &[&str] = &["бои", "сражения"];
const HITS_LABELS: &[&str] = &["попадания", "процент попаданий"];
const AVG_DMG_LABELS: &[&str] = &["средний урон"];
const AVG_EXP_LABELS: &[&str] = &["средний опыт за бой"];
const MAX_EXP_LABELS: &[&str] = &["максимальный опыт за бой"];
const MAX_FRAGS_LABELS: &[&str] = &["максимум уничтожено за бой"];
const MASTERY_LABELS: &[&str] = &["знаки классности мастер"];

static MASTERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([\d\s.,]+)\s*/\s*([\d\s.,]+)\s*$").expect("valid regex"));

/// Map one retrieval tier's output to a candidate stats record.
pub fn map_stats(
    labels: &HashMap<String, String>,
    nickname: Option<&str>,
    fallback_text: Option<&str>,
) -> PlayerStats {
    let labels: HashMap<String, &str> = labels
        .iter()
        .map(|(k, v)| (canonicalize_label(k), v.as_str()))
        .collect();
    let lookup = |keys: &[&str]| keys.iter().find_map(|k| labels.get(*k).copied());

    let (master_count, vehicles_count) = lookup(MASTERY_LABELS)
        .and_then(parse_mastery)
        .map_or((None, None), |(m, v)| (Some(m), Some(v)));

    let mut stats = PlayerStats {
        nickname: nickname.map(str::to_string),
        battles: lookup(BATTLES_LABELS).and_then(parse_count).unwrap_or(0),
        wins: None,
        win_rate: lookup(WIN_RATE_LABELS).and_then(parse_number),
        avg_dmg: lookup(AVG_DMG_LABELS).and_then(parse_count).unwrap_or(0),
        avg_frags: None,
        survive_rate: None,
        hits_percents: lookup(HITS_LABELS).and_then(parse_number),
        global_rating: lookup(RATING_LABELS).and_then(parse_count).unwrap_or(0),
        avg_exp: lookup(AVG_EXP_LABELS).and_then(parse_count),
        max_exp: lookup(MAX_EXP_LABELS).and_then(parse_count),
        max_frags: lookup(MAX_FRAGS_LABELS).and_then(parse_count),
        master_count,
        vehicles_count,
    };

    if let Some(text) = fallback_text {
        apply_pattern_fallback(&mut stats, text);
    }

    stats.wins = derive_wins(stats.battles, stats.win_rate);
    stats
}

/// Fill fields still at their zero/unknown default from raw text. Fields the
/// structured pass did read are never touched.
fn apply_pattern_fallback(stats: &mut PlayerStats, text: &str) {
    if stats.battles == 0 {
        stats.battles = pattern_count(PatternField::Battles, text).unwrap_or(0);
    }
    if stats.win_rate.map_or(true, |wr| wr == 0.0) {
        if let Some(wr) = patterns::extract_number(PatternField::WinRate, text) {
            stats.win_rate = Some(wr);
        }
    }
    if stats.avg_dmg == 0 {
        stats.avg_dmg = pattern_count(PatternField::AvgDmg, text).unwrap_or(0);
    }
    if stats.hits_percents.is_none() {
        stats.hits_percents = patterns::extract_number(PatternField::HitsPercents, text);
    }
    if stats.global_rating == 0 {
        stats.global_rating = pattern_count(PatternField::Rating, text).unwrap_or(0);
    }
    if stats.avg_frags.is_none() {
        stats.avg_frags = patterns::extract_number(PatternField::AvgFrags, text);
    }
    if stats.survive_rate.is_none() {
        stats.survive_rate = patterns::extract_number(PatternField::SurviveRate, text);
    }
}

/// round(battles × winRate / 100), only when both are known.
pub fn derive_wins(battles: u64, win_rate: Option<f64>) -> Option<u64> {
    let wr = win_rate?;
    if battles == 0 {
        return None;
    }
    let wins = (battles as f64 * wr / 100.0).round();
    (wins >= 0.0).then_some(wins as u64)
}

/// "X / Y" → (earned, total).
fn parse_mastery(text: &str) -> Option<(u64, u64)> {
    let caps = MASTERY_RE.captures(text)?;
    Some((parse_count(&caps[1])?, parse_count(&caps[2])?))
}

fn parse_count(text: &str) -> Option<u64> {
    parse_integer(text).and_then(|v| u64::try_from(v).ok())
}

fn pattern_count(field: PatternField, text: &str) -> Option<u64> {
    patterns::extract_integer(field, text).and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn maps_the_profile_block() {
        let map = labels(&[
            ("бои", "1 234"),
            ("победы", "55.5%"),
            ("средний урон", "987"),
            ("личный рейтинг", "5000"),
        ]);
        let stats = map_stats(&map, Some("Ivan"), None);

        assert_eq!(stats.nickname.as_deref(), Some("Ivan"));
        assert_eq!(stats.battles, 1234);
        assert_eq!(stats.win_rate, Some(55.5));
        assert_eq!(stats.avg_dmg, 987);
        assert_eq!(stats.global_rating, 5000);
        assert_eq!(stats.wins, Some(685));
        assert_eq!(stats.hits_percents, None);
    }

    #[test]
    fn keys_are_canonicalized_before_lookup() {
        let map = labels(&[
            ("  Личный\u{a0}Рейтинг: ", "4 100"),
            ("БОИ", "10"),
            ("Знаки классности «Мастер»", "12 / 340"),
            ("Максимальный опыт за бой", "2 345"),
        ]);
        let stats = map_stats(&map, None, None);
        assert_eq!(stats.global_rating, 4100);
        assert_eq!(stats.battles, 10);
        assert_eq!(stats.master_count, Some(12));
        assert_eq!(stats.vehicles_count, Some(340));
        assert_eq!(stats.max_exp, Some(2345));
    }

    #[test]
    fn malformed_mastery_leaves_both_unknown() {
        let stats = map_stats(&labels(&[("знаки классности мастер", "12")]), None, None);
        assert_eq!(stats.master_count, None);
        assert_eq!(stats.vehicles_count, None);
    }

    #[test]
    fn wins_need_both_operands() {
        assert_eq!(derive_wins(0, Some(50.0)), None);
        assert_eq!(derive_wins(100, None), None);
        assert_eq!(derive_wins(1234, Some(55.5)), Some(685));
        assert_eq!(derive_wins(10, Some(0.0)), Some(0));
    }

    #[test]
    fn fallback_fills_only_missing_fields() {
        let map = labels(&[("бои", "2 000"), ("средний урон", "")]);
        let text = "Бои: 9999\nСредний урон 1 500\nЛичный рейтинг 7 000\nПроцент побед 50%";
        let stats = map_stats(&map, None, Some(text));

        assert_eq!(stats.battles, 2000);
        assert_eq!(stats.avg_dmg, 1500);
        assert_eq!(stats.global_rating, 7000);
        assert_eq!(stats.win_rate, Some(50.0));
        assert_eq!(stats.wins, Some(1000));
    }

    #[test]
    fn empty_mapping_relies_on_text() {
        let stats = map_stats(&HashMap::new(), Some("Ivan"), Some("Бои: 500"));
        assert_eq!(stats.battles, 500);
        assert_eq!(stats.avg_dmg, 0);
        assert_eq!(stats.global_rating, 0);
        assert_eq!(stats.wins, None);
    }

    #[test]
    fn no_fallback_text_means_no_pattern_pass() {
        let stats = map_stats(&HashMap::new(), None, None);
        assert_eq!(stats, PlayerStats::default());
    }
}
