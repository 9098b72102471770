use crate::client::PortalClient;
use crate::services::raw::upsert_day;
use crate::utils::{date_range, date_to_yyyymmdd};
use chrono::{Local, NaiveDate};
use diesel::SqliteConnection;
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub saved: usize,
    pub skipped: usize,
}

/// Fetch one payload per date in `start..=end` and store it verbatim.
///
/// A date whose request fails is skipped; a storage failure aborts the loop.
pub fn run_range(
    conn: &mut SqliteConnection,
    client: &PortalClient,
    start: NaiveDate,
    end: NaiveDate,
    spacing: Duration,
) -> Result<FetchSummary, String> {
    info!("Fetch: {} to {} (inclusive)", start, end);
    let mut summary = FetchSummary::default();

    for day in date_range(start, end)? {
        let tick_start = Instant::now();
        let date_int = date_to_yyyymmdd(day);
        info!("Fetch: requesting {} (date={})", day, date_int);

        match client.fetch_day(date_int) {
            Ok(raw_json) => {
                let fetched_at = Local::now().naive_local();
                upsert_day(conn, date_int, fetched_at, &raw_json)?;
                summary.saved += 1;
                info!("Fetch: saved {} ({} bytes)", day, raw_json.len());
            }
            Err(e) => {
                summary.skipped += 1;
                warn!("Fetch: skipping {}: {}", day, e);
            }
        }

        // Keep a steady request cadence
        let elapsed = tick_start.elapsed();
        if day < end && elapsed < spacing {
            thread::sleep(spacing - elapsed);
        }
    }

    info!("Fetch: {} day(s) saved, {} skipped", summary.saved, summary.skipped);
    Ok(summary)
}
