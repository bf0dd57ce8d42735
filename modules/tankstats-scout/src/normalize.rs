// Number and label normalization for ru-locale profile text.
//
// Values arrive as page text: "1 234", "55,5 %", "12.345", "5 000\u{a0}". None of
// these functions fail; text that does not parse is simply unknown.

const NBSP: char = '\u{a0}';

/// Parse a locale-formatted number.
///
/// Keeps digits, `,`, `.` and `-`. A lone comma with no dot is the decimal
/// separator. A dot preceded by a digit and followed by exactly three digits
/// (then a non-digit or the end) is a thousands separator and is dropped.
/// Spaces, including NBSP, never survive the character filter, so space
/// grouping needs no special case.
pub fn parse_number(text: &str) -> Option<f64> {
    let kept: Vec<char> = text
        .replace(NBSP, " ")
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if !kept.iter().any(char::is_ascii_digit) {
        return None;
    }

    let commas = kept.iter().filter(|&&c| c == ',').count();
    let has_dot = kept.contains(&'.');
    let chars: Vec<char> = if commas == 1 && !has_dot {
        kept.into_iter().map(|c| if c == ',' { '.' } else { c }).collect()
    } else {
        kept
    };

    let cleaned: String = chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| !(c == '.' && is_grouping_dot(&chars, i)))
        .map(|(_, &c)| c)
        .collect();

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `parse_number` rounded to the nearest integer (halves away from zero).
pub fn parse_integer(text: &str) -> Option<i64> {
    parse_number(text).map(|v| v.round() as i64)
}

/// Canonical form of a page label: the join key between page text and fields.
pub fn canonicalize_label(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| match c {
            NBSP => ' ',
            '«' | '»' | '"' | '\'' | '’' | '“' | '”' | '–' | '—' | ':' => ' ',
            other => other,
        })
        .collect();
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_grouping_dot(chars: &[char], i: usize) -> bool {
    let preceded_by_digit = i > 0 && chars[i - 1].is_ascii_digit();
    let three_digits = chars.len() >= i + 4 && chars[i + 1..i + 4].iter().all(char::is_ascii_digit);
    let then_boundary = chars.get(i + 4).map_or(true, |c| !c.is_ascii_digit());
    preceded_by_digit && three_digits && then_boundary
}
