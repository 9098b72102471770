//! Runtime configuration read from the environment.
//! Defaults target the school the scraper was written for and a local
//! `substitutions.db` next to the binary.

use chrono::{Local, NaiveDate};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "substitutions.db";
pub const DEFAULT_PORTAL_URL: &str = "https://friedrich-dessauer-schule-limburg.webuntis.com/WebUntis/monitor/substitution/data";
pub const DEFAULT_PORTAL_SCHOOL: &str = "friedrich-dessauer-schule-limburg";
pub const DEFAULT_PORTAL_FORMAT: &str = "Web-Schüler-heute";
pub const DEFAULT_FETCH_SLEEP_MS: u64 = 500;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_MAX_REQUEST_RETRIES: u32 = 2;
pub const DEFAULT_REPORT_LIMIT: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file holding both raw and derived tables.
    pub database_url: String,
    /// Substitution monitor data endpoint (without query string).
    pub portal_url: String,
    /// School identifier, sent as `schoolName` and `?school=`.
    pub portal_school: String,
    /// Monitor format the payload is rendered with.
    pub portal_format: String,
    /// First date to fetch (inclusive).
    pub fetch_from_date: NaiveDate,
    /// Last date to fetch (inclusive).
    pub fetch_to_date: NaiveDate,
    /// Pause between two portal requests.
    pub fetch_sleep: Duration,
    pub fetch_timeout: Duration,
    /// Attempts per date before the date is skipped.
    pub max_request_retries: NonZeroU32,
    pub report_limit: i64,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_date(key: &str) -> Result<Option<NaiveDate>, String> {
    env_non_empty(key)
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| format!("{key} must be in YYYY-MM-DD format")))
        .transpose()
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env_non_empty(key) {
        Some(s) => s.parse::<T>().map_err(|_| format!("{key} must be an integer, got {s:?}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let portal_url = env_non_empty("PORTAL_URL").unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string());
        let portal_school = env_non_empty("PORTAL_SCHOOL").unwrap_or_else(|| DEFAULT_PORTAL_SCHOOL.to_string());
        let portal_format = env_non_empty("PORTAL_FORMAT").unwrap_or_else(|| DEFAULT_PORTAL_FORMAT.to_string());

        let fetch_from_date = env_date("FETCH_FROM_DATE")?.unwrap_or_else(|| Local::now().date_naive());
        let fetch_to_date = env_date("FETCH_TO_DATE")?.unwrap_or(fetch_from_date);
        if fetch_to_date < fetch_from_date {
            return Err(format!(
                "FETCH_TO_DATE ({}) must not be before FETCH_FROM_DATE ({})",
                fetch_to_date, fetch_from_date
            ));
        }

        let fetch_sleep_ms = env_number("FETCH_SLEEP_MS", DEFAULT_FETCH_SLEEP_MS)?;
        let fetch_timeout_secs = env_number("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;
        let max_request_retries = NonZeroU32::new(env_number("MAX_REQUEST_RETRIES", DEFAULT_MAX_REQUEST_RETRIES)?)
            .ok_or_else(|| "MAX_REQUEST_RETRIES must be at least 1".to_string())?;
        let report_limit = env_number("REPORT_LIMIT", DEFAULT_REPORT_LIMIT)?;
        if report_limit < 1 {
            return Err("REPORT_LIMIT must be at least 1".to_string());
        }

        Ok(Config {
            database_url,
            portal_url,
            portal_school,
            portal_format,
            fetch_from_date,
            fetch_to_date,
            fetch_sleep: Duration::from_millis(fetch_sleep_ms),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            max_request_retries,
            report_limit,
        })
    }
}

/// Load `KEY=value` lines from a `.env` file into the process environment.
///
/// Variables that are already set are left untouched. Supports comments,
/// `export` prefixes and single/double quoted values.
pub fn load_env_file(path: &Path) -> Result<(), String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in content.lines().enumerate() {
        let Some((key, value)) = parse_env_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        if std::env::var_os(&key).is_none() {
            // Mutating the process environment is unsafe on some targets;
            // this runs before any other thread exists.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn parse_env_line(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let assignment = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);
    let (key, raw_value) = assignment
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(format!("invalid environment variable name: {:?}", key));
    }
    Ok(Some((key.to_string(), parse_env_value(raw_value.trim())?)))
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            let end = rest.find(quote).ok_or_else(|| format!("unterminated {quote} quoted value"))?;
            let tail = rest[end + 1..].trim();
            if !tail.is_empty() && !tail.starts_with('#') {
                return Err("unexpected characters after closing quote".to_string());
            }
            let value = &rest[..end];
            return Ok(if quote == '"' {
                value.replace("\\n", "\n").replace("\\t", "\t")
            } else {
                value.to_string()
            });
        }
    }
    Ok(raw.split('#').next().unwrap_or_default().trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lines() {
        assert_eq!(parse_env_line("# comment").unwrap(), None);
        assert_eq!(parse_env_line("").unwrap(), None);
        assert_eq!(
            parse_env_line("export DATABASE_URL=/tmp/s.db # local").unwrap(),
            Some(("DATABASE_URL".to_string(), "/tmp/s.db".to_string()))
        );
        assert_eq!(
            parse_env_line("PORTAL_FORMAT=\"Web-Schüler-heute\"").unwrap(),
            Some(("PORTAL_FORMAT".to_string(), "Web-Schüler-heute".to_string()))
        );
        assert_eq!(
            parse_env_line("RUST_LOG='debug,ureq=info'").unwrap(),
            Some(("RUST_LOG".to_string(), "debug,ureq=info".to_string()))
        );
    }

    #[test]
    fn bad_env_lines() {
        assert!(parse_env_line("JUST_A_NAME").is_err());
        assert!(parse_env_line("BAD NAME=1").is_err());
        assert!(parse_env_line("X=\"open").is_err());
        assert!(parse_env_line("X=\"a\" b").is_err());
    }
}
