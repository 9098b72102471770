//! Raw day store: one verbatim portal payload per calendar date.

use crate::db::models::{NewSubstitutionDay, SubstitutionDay};
use crate::schema;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::SqliteConnection;

/// Insert the payload for `date_yyyymmdd`, or overwrite it when the date was
/// fetched before. The row id of an existing date is kept.
pub fn upsert_day(
    conn: &mut SqliteConnection,
    date_yyyymmdd: i32,
    fetched_at: NaiveDateTime,
    raw_json: &str,
) -> Result<usize, String> {
    use schema::substitutions::dsl as S;

    let new_row = NewSubstitutionDay {
        date_yyyymmdd,
        fetched_at,
        raw_json,
    };
    diesel::insert_into(S::substitutions)
        .values(&new_row)
        .on_conflict(S::date_yyyymmdd)
        .do_update()
        .set((S::fetched_at.eq(fetched_at), S::raw_json.eq(raw_json)))
        .execute(conn)
        .map_err(|e| format!("upsert substitution day {} failed: {}", date_yyyymmdd, e))
}

/// Every stored day, oldest date first.
pub fn load_days(conn: &mut SqliteConnection) -> QueryResult<Vec<SubstitutionDay>> {
    use schema::substitutions::dsl as S;

    S::substitutions
        .order(S::date_yyyymmdd.asc())
        .select(SubstitutionDay::as_select())
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fetched_at, memory_connection};

    #[test]
    fn refetch_overwrites_payload_and_keeps_id() {
        let mut conn = memory_connection();
        upsert_day(&mut conn, 20251208, fetched_at(), r#"{"payload":{}}"#).unwrap();
        let first = load_days(&mut conn).unwrap();

        upsert_day(&mut conn, 20251208, fetched_at(), r#"{"payload":{"rows":[]}}"#).unwrap();
        let second = load_days(&mut conn).unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].raw_json, r#"{"payload":{"rows":[]}}"#);
    }

    #[test]
    fn days_come_back_in_date_order() {
        let mut conn = memory_connection();
        for date in [20251210, 20251208, 20251209] {
            upsert_day(&mut conn, date, fetched_at(), "{}").unwrap();
        }
        let dates: Vec<i32> = load_days(&mut conn)
            .unwrap()
            .into_iter()
            .map(|d| d.date_yyyymmdd)
            .collect();
        assert_eq!(dates, vec![20251208, 20251209, 20251210]);
    }
}
