use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

/// Compile `pattern` into `cell` on first use.
///
/// Patterns are literals in this crate, so a compile failure is a bug.
pub fn compile(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("regex {pattern:?} failed to compile: {e}")))
}

/// `2025-12-08` -> `20251208`, the key the portal and the raw store use.
pub fn date_to_yyyymmdd(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

pub fn yyyymmdd_to_date(value: i32) -> Option<NaiveDate> {
    if value <= 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(value / 10_000, (value / 100 % 100) as u32, (value % 100) as u32)
}

/// Every date from `start` to `end`, both inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<impl Iterator<Item = NaiveDate>, String> {
    if end < start {
        return Err(format!("end date {} is before start date {}", end, start));
    }
    Ok(start.iter_days().take_while(move |d| *d <= end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn compiled_regex_is_reused() {
        static CELL: OnceLock<Regex> = OnceLock::new();
        let first = compile(&CELL, r"\d+");
        let second = compile(&CELL, r"[a-z]+");
        assert!(std::ptr::eq(first, second));
        assert!(second.is_match("42"));
    }

    #[test]
    fn yyyymmdd_conversions() {
        assert_eq!(date_to_yyyymmdd(date(2025, 12, 8)), 20251208);
        assert_eq!(yyyymmdd_to_date(20251208), Some(date(2025, 12, 8)));
        assert_eq!(yyyymmdd_to_date(20251340), None);
        assert_eq!(yyyymmdd_to_date(0), None);
    }

    #[test]
    fn date_range_is_inclusive() {
        let days: Vec<_> = date_range(date(2025, 12, 30), date(2026, 1, 2)).unwrap().collect();
        assert_eq!(
            days,
            vec![date(2025, 12, 30), date(2025, 12, 31), date(2026, 1, 1), date(2026, 1, 2)]
        );
        assert_eq!(date_range(date(2025, 12, 8), date(2025, 12, 8)).unwrap().count(), 1);
        assert!(date_range(date(2025, 12, 9), date(2025, 12, 8)).is_err());
    }
}
