// Last-resort extraction straight from page text (HTML or reader output),
// used when the labeled stats block is missing or only partly parsed.
// The site has renamed several labels over the years, so each field matches
// every known synonym.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::{parse_integer, parse_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternField {
    Battles,
    WinRate,
    AvgDmg,
    HitsPercents,
    Rating,
    AvgFrags,
    SurviveRate,
}

static BATTLES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Бои|Сражения|Баталии)[^0-9]*([0-9\s.,]+)").expect("valid regex")
});
static WIN_RATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Процент\s*побед[^\d%]*([0-9]+(?:[.,]\d+)?)").expect("valid regex")
});
static AVG_DMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Средн(?:ий|яя)\s*урон[^\d]*([0-9\s.,]+)").expect("valid regex")
});
static HITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Процент\s*попадан[^\d%]*([0-9]+(?:[.,]\d+)?)").expect("valid regex")
});
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bWTR\b|\bGR\b|Рейтинг|\bРЭ\b|Личный\s*рейтинг)[^0-9]*([0-9\s.,]+)")
        .expect("valid regex")
});
static AVG_FRAGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Ср\.?\s*фраги|Средн(?:ее|их)?\s*уничтожен)[^0-9%]{0,40}([0-9]+(?:[.,]\d+)?)")
        .expect("valid regex")
});
static SURVIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Выживаемость|Процент\s*выживаемости)[^0-9%]{0,40}([0-9]+(?:[.,]\d+)?)")
        .expect("valid regex")
});

impl PatternField {
    fn regex(self) -> &'static Regex {
        match self {
            PatternField::Battles => &BATTLES_RE,
            PatternField::WinRate => &WIN_RATE_RE,
            PatternField::AvgDmg => &AVG_DMG_RE,
            PatternField::HitsPercents => &HITS_RE,
            PatternField::Rating => &RATING_RE,
            PatternField::AvgFrags => &AVG_FRAGS_RE,
            PatternField::SurviveRate => &SURVIVE_RE,
        }
    }
}

/// Raw numeric text captured for `field`, first match wins.
pub fn capture(field: PatternField, text: &str) -> Option<&str> {
    field
        .regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn extract_number(field: PatternField, text: &str) -> Option<f64> {
    capture(field, text).and_then(parse_number)
}

pub fn extract_integer(field: PatternField, text: &str) -> Option<i64> {
    capture(field, text).and_then(parse_integer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const READER_TEXT: &str = "Title: Ivan | Профиль игрока\n\
        Бои: 12 345\n\
        Процент побед 52,75%\n\
        Средний урон 1 870\n\
        Процент попаданий 71,2 %\n\
        Личный рейтинг 6 420\n\
        Выживаемость 34,1%\n";

    #[test]
    fn every_field_from_reader_text() {
        assert_eq!(extract_integer(PatternField::Battles, READER_TEXT), Some(12345));
        assert_eq!(extract_number(PatternField::WinRate, READER_TEXT), Some(52.75));
        assert_eq!(extract_integer(PatternField::AvgDmg, READER_TEXT), Some(1870));
        assert_eq!(extract_number(PatternField::HitsPercents, READER_TEXT), Some(71.2));
        assert_eq!(extract_integer(PatternField::Rating, READER_TEXT), Some(6420));
        assert_eq!(extract_number(PatternField::SurviveRate, READER_TEXT), Some(34.1));
    }

    #[test]
    fn historical_synonyms() {
        assert_eq!(extract_integer(PatternField::Battles, "Сражения — 777"), Some(777));
        assert_eq!(extract_integer(PatternField::Battles, "БАТАЛИИ 42"), Some(42));
        assert_eq!(extract_integer(PatternField::AvgDmg, "Средняя урон: 900"), Some(900));
        assert_eq!(extract_integer(PatternField::Rating, "WTR 3 100"), Some(3100));
        assert_eq!(extract_number(PatternField::AvgFrags, "Ср. фраги 1,05"), Some(1.05));
    }

    #[test]
    fn fields_fail_independently() {
        let text = "Бои: 500";
        assert_eq!(extract_integer(PatternField::Battles, text), Some(500));
        assert_eq!(extract_number(PatternField::WinRate, text), None);
        assert_eq!(extract_integer(PatternField::AvgDmg, text), None);
        assert_eq!(extract_integer(PatternField::Rating, text), None);
    }

    #[test]
    fn abbreviations_need_word_boundaries() {
        assert_eq!(extract_integer(PatternField::Rating, "background: #000 progress 12"), None);
    }

    #[test]
    fn no_text_no_match() {
        assert_eq!(capture(PatternField::Battles, ""), None);
    }
}
