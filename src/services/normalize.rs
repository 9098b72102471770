//! Rebuild the derived tables from the raw day store.
//!
//! A run drops and recreates every derived table and then replays all stored
//! days in date order, so the derived model is always a pure function of the
//! raw store. The whole run is one transaction: a storage failure rolls back
//! to the previous derived state instead of leaving a half-built schema. Days
//! whose JSON cannot be read are skipped with a warning.

use crate::classify::{is_cancelled, is_room_change, is_teacher_change};
use crate::db::derived::reset_derived_schema;
use crate::db::models::{NewEntryClass, NewMessage, NewSubstitutionEntry, SubstitutionDay};
use crate::extract::{extract_room_info, extract_teacher_info, plain_text};
use crate::models::monitor::{columns, message_text, DayDocument, Row};
use crate::parse::{parse_period, parse_time_range, split_classes};
use crate::schema;
use crate::services::raw::load_days;
use crate::services::resolver::{EntityResolver, LookupTable};
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Errors that abort a normalization run.
#[derive(Debug)]
pub enum NormalizeError {
    /// Schema reset, read or write against the store failed.
    Storage(diesel::result::Error),
}

impl Display for NormalizeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl Error for NormalizeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NormalizeError::Storage(e) => Some(e),
        }
    }
}

impl From<diesel::result::Error> for NormalizeError {
    fn from(value: diesel::result::Error) -> Self {
        NormalizeError::Storage(value)
    }
}

/// A day payload that is not valid JSON or not of the expected shape.
#[derive(Debug)]
pub struct PayloadError(serde_path_to_error::Error<serde_json::Error>);

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let path = self.0.path().to_string();
        if path == "." {
            write!(f, "malformed payload: {}", self.0.inner())
        } else {
            write!(f, "malformed payload at {}: {}", path, self.0.inner())
        }
    }
}

impl Error for PayloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.inner())
    }
}

pub fn parse_day(raw_json: &str) -> Result<DayDocument, PayloadError> {
    let de = &mut serde_json::Deserializer::from_str(raw_json);
    let doc: DayDocument = serde_path_to_error::deserialize(de).map_err(PayloadError)?;
    Ok(doc)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub days_total: usize,
    pub days_normalized: usize,
    pub days_skipped: usize,
    pub entries: usize,
    pub messages: usize,
    pub class_links: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct DayCounts {
    entries: usize,
    messages: usize,
    class_links: usize,
}

/// Everything derived from one table row before codes are resolved to ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDraft {
    pub group_label: Option<String>,
    pub period_raw: Option<String>,
    pub period_start: Option<i32>,
    pub period_end: Option<i32>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub subject_raw: Option<String>,
    pub info_flag: Option<String>,
    pub comment: Option<String>,
    pub classes: Vec<String>,
    pub room_new: Option<String>,
    pub room_old: Option<String>,
    pub teacher_new: Option<String>,
    pub teacher_absent: Option<String>,
    pub is_cancelled: bool,
    pub is_room_change: bool,
    pub is_teacher_change: bool,
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}

impl EntryDraft {
    pub fn from_row(row: &Row) -> Self {
        let period_raw = plain_text(row.cell(columns::PERIOD));
        let time_raw = plain_text(row.cell(columns::TIME));
        let classes_raw = plain_text(row.cell(columns::CLASSES));
        let subject_raw = plain_text(row.cell(columns::SUBJECT));
        let info_flag = plain_text(row.cell(columns::INFO));
        let comment = plain_text(row.cell(columns::COMMENT));

        let (period_start, period_end) = parse_period(&period_raw);
        let (time_start, time_end) = parse_time_range(&time_raw);
        let (room_new, room_old) = extract_room_info(row.cell(columns::ROOM));
        let (teacher_new, teacher_absent) = extract_teacher_info(row.cell(columns::TEACHER));

        let is_cancelled = is_cancelled(row.cells(), row.style_classes());
        let is_room_change = is_room_change(&info_flag, room_new.as_deref(), room_old.as_deref());
        let is_teacher_change = is_teacher_change(teacher_new.as_deref(), teacher_absent.as_deref());

        EntryDraft {
            group_label: row.group.clone().and_then(non_blank),
            period_raw: non_blank(period_raw),
            period_start,
            period_end,
            time_start,
            time_end,
            subject_raw: non_blank(subject_raw),
            info_flag: non_blank(info_flag),
            comment: non_blank(comment),
            classes: split_classes(&classes_raw),
            room_new,
            room_old,
            teacher_new,
            teacher_absent,
            is_cancelled,
            is_room_change,
            is_teacher_change,
        }
    }
}

/// Drop and rebuild all derived tables from every stored day.
pub fn run(conn: &mut SqliteConnection) -> Result<NormalizeSummary, NormalizeError> {
    conn.transaction(|conn| {
        reset_derived_schema(conn)?;
        let days = load_days(conn)?;
        info!("Normalizing {} substitution day(s)", days.len());

        let mut resolver = EntityResolver::new();
        let mut summary = NormalizeSummary {
            days_total: days.len(),
            ..Default::default()
        };

        for day in &days {
            let doc = match parse_day(&day.raw_json) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(
                        "Skipping substitution day {} (date={}): {}",
                        day.id, day.date_yyyymmdd, e
                    );
                    summary.days_skipped += 1;
                    continue;
                }
            };

            let counts = conn.transaction(|conn| write_day(conn, &mut resolver, day, &doc))?;
            summary.days_normalized += 1;
            summary.entries += counts.entries;
            summary.messages += counts.messages;
            summary.class_links += counts.class_links;
            info!(
                "Normalized substitution day {} (date={}): {} entries, {} messages",
                day.id, day.date_yyyymmdd, counts.entries, counts.messages
            );
        }

        debug!("Normalize: resolver holds {} code(s)", resolver.len());
        Ok(summary)
    })
}

fn write_day(
    conn: &mut SqliteConnection,
    resolver: &mut EntityResolver,
    day: &SubstitutionDay,
    doc: &DayDocument,
) -> QueryResult<DayCounts> {
    let mut counts = DayCounts::default();

    let messages = doc
        .messages()
        .iter()
        .enumerate()
        .map(|(idx, msg)| NewMessage {
            substitution_id: day.id,
            message_index: idx as i32,
            text: Some(message_text(msg)),
        })
        .collect::<Vec<_>>();
    if !messages.is_empty() {
        counts.messages = diesel::insert_into(schema::message::table)
            .values(&messages)
            .execute(conn)?;
    }

    for (row_index, row) in doc.rows().iter().enumerate() {
        let draft = EntryDraft::from_row(row);
        counts.class_links += write_entry(conn, resolver, day.id, row_index as i32, draft)?;
        counts.entries += 1;
    }

    Ok(counts)
}

/// Insert one entry with its class links; returns the number of links.
fn write_entry(
    conn: &mut SqliteConnection,
    resolver: &mut EntityResolver,
    day_id: i32,
    row_index: i32,
    draft: EntryDraft,
) -> QueryResult<usize> {
    use schema::substitution_entry::dsl as E;

    let room_new_id = resolver.resolve(conn, LookupTable::Room, draft.room_new.as_deref())?;
    let room_old_id = resolver.resolve(conn, LookupTable::Room, draft.room_old.as_deref())?;
    let teacher_new_id = resolver.resolve(conn, LookupTable::Teacher, draft.teacher_new.as_deref())?;
    let teacher_absent_id = resolver.resolve(conn, LookupTable::Teacher, draft.teacher_absent.as_deref())?;
    // not referenced by entries, but keeps the subject table complete
    resolver.resolve(conn, LookupTable::Subject, draft.subject_raw.as_deref())?;

    let new_row = NewSubstitutionEntry {
        substitution_id: day_id,
        row_index,
        group_label: draft.group_label,
        period_raw: draft.period_raw,
        period_start: draft.period_start,
        period_end: draft.period_end,
        time_start: draft.time_start,
        time_end: draft.time_end,
        subject_raw: draft.subject_raw,
        info_flag: draft.info_flag,
        comment: draft.comment,
        is_cancelled: draft.is_cancelled,
        is_room_change: draft.is_room_change,
        is_teacher_change: draft.is_teacher_change,
        room_new_id,
        room_old_id,
        teacher_new_id,
        teacher_absent_id,
    };
    let entry_id: i32 = diesel::insert_into(E::substitution_entry)
        .values(&new_row)
        .returning(E::id)
        .get_result(conn)?;

    let mut class_ids = BTreeSet::new();
    for code in &draft.classes {
        if let Some(class_id) = resolver.resolve(conn, LookupTable::Class, Some(code))? {
            class_ids.insert(class_id);
        }
    }
    let links = class_ids
        .into_iter()
        .map(|class_id| NewEntryClass { entry_id, class_id })
        .collect::<Vec<_>>();
    if links.is_empty() {
        return Ok(0);
    }
    diesel::insert_or_ignore_into(schema::entry_class::table)
        .values(&links)
        .execute(conn)
}
