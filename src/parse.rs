//! Parsers for plain-text cell content (period, time range, class list).
//!
//! None of these fail: anything unrecognised comes back as `None`/empty.

use crate::utils::compile;
use regex::Regex;
use std::sync::OnceLock;

static PERIOD_RANGE_RE: OnceLock<Regex> = OnceLock::new();
static PERIOD_SINGLE_RE: OnceLock<Regex> = OnceLock::new();

fn period_range_regex() -> &'static Regex {
    compile(&PERIOD_RANGE_RE, r"^\s*(\d+)\s*-\s*(\d+)\s*$")
}

fn period_single_regex() -> &'static Regex {
    compile(&PERIOD_SINGLE_RE, r"^\s*(\d+)\s*$")
}

/// Placeholder the portal uses for an unknown class.
const UNKNOWN_CLASS: &str = "?";

/// `"5"` -> `(5, 5)`, `"1 - 3"` -> `(1, 3)`, anything else -> `(None, None)`.
///
/// Reversed ranges (`"3 - 1"`) and numbers that overflow are treated as
/// unrecognised; start and end are always both present or both absent.
pub fn parse_period(text: &str) -> (Option<i32>, Option<i32>) {
    if let Some(caps) = period_range_regex().captures(text) {
        let start = caps[1].parse::<i32>().ok();
        let end = caps[2].parse::<i32>().ok();
        return match (start, end) {
            (Some(s), Some(e)) if s <= e => (Some(s), Some(e)),
            _ => (None, None),
        };
    }
    match period_single_regex()
        .captures(text)
        .and_then(|caps| caps[1].parse::<i32>().ok())
    {
        Some(n) => (Some(n), Some(n)),
        None => (None, None),
    }
}

/// `"07:45-10:15"` -> `("07:45", "10:15")`.
///
/// Splits on the first `-` only and trims both halves; the halves are kept
/// as opaque strings.
pub fn parse_time_range(text: &str) -> (Option<String>, Option<String>) {
    match text.split_once('-') {
        Some((start, end)) => (Some(start.trim().to_string()), Some(end.trim().to_string())),
        None => (None, None),
    }
}

/// Comma separated class codes in source order, without blanks and `?`.
pub fn split_classes(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != UNKNOWN_CLASS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_shapes() {
        assert_eq!(parse_period("5"), (Some(5), Some(5)));
        assert_eq!(parse_period("1 - 3"), (Some(1), Some(3)));
        assert_eq!(parse_period("  7-8 "), (Some(7), Some(8)));
        assert_eq!(parse_period(""), (None, None));
        assert_eq!(parse_period("abc"), (None, None));
        assert_eq!(parse_period("1 - 3 - 5"), (None, None));
        assert_eq!(parse_period("-2"), (None, None));
    }

    #[test]
    fn period_reversed_or_overflowing_is_unrecognised() {
        assert_eq!(parse_period("3 - 1"), (None, None));
        assert_eq!(parse_period("99999999999"), (None, None));
    }

    #[test]
    fn time_range_splits_on_first_dash() {
        assert_eq!(
            parse_time_range("07:45-10:15"),
            (Some("07:45".to_string()), Some("10:15".to_string()))
        );
        assert_eq!(
            parse_time_range(" 07:45 - 10:15 "),
            (Some("07:45".to_string()), Some("10:15".to_string()))
        );
        assert_eq!(
            parse_time_range("no-dash-here-at-all"),
            (Some("no".to_string()), Some("dash-here-at-all".to_string()))
        );
        assert_eq!(parse_time_range(""), (None, None));
        assert_eq!(parse_time_range("07:45"), (None, None));
    }

    #[test]
    fn class_lists() {
        assert_eq!(split_classes("11A BZ, 12A BZ"), vec!["11A BZ", "12A BZ"]);
        assert_eq!(split_classes("10A BV, ?"), vec!["10A BV"]);
        assert_eq!(split_classes(""), Vec::<String>::new());
        assert_eq!(split_classes(" , 9B,,9C "), vec!["9B", "9C"]);
    }
}
