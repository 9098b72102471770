//! Diesel model structs for the raw day store and the derived tables.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::substitutions)]
pub struct SubstitutionDay {
    pub id: i32,
    pub date_yyyymmdd: i32,
    pub fetched_at: NaiveDateTime,
    pub raw_json: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::substitutions)]
pub struct NewSubstitutionDay<'a> {
    pub date_yyyymmdd: i32,
    pub fetched_at: NaiveDateTime,
    pub raw_json: &'a str,
}

/// Shape shared by the four code lookup tables (teacher/room/class/subject).
#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct CodeRow {
    pub id: i32,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::substitution_entry)]
pub struct SubstitutionEntry {
    pub id: i32,
    pub substitution_id: i32,
    pub row_index: i32,
    pub group_label: Option<String>,
    pub period_raw: Option<String>,
    pub period_start: Option<i32>,
    pub period_end: Option<i32>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub subject_raw: Option<String>,
    pub info_flag: Option<String>,
    pub comment: Option<String>,
    pub is_cancelled: bool,
    pub is_room_change: bool,
    pub is_teacher_change: bool,
    pub room_new_id: Option<i32>,
    pub room_old_id: Option<i32>,
    pub teacher_new_id: Option<i32>,
    pub teacher_absent_id: Option<i32>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::substitution_entry)]
pub struct NewSubstitutionEntry {
    pub substitution_id: i32,
    pub row_index: i32,
    pub group_label: Option<String>,
    pub period_raw: Option<String>,
    pub period_start: Option<i32>,
    pub period_end: Option<i32>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub subject_raw: Option<String>,
    pub info_flag: Option<String>,
    pub comment: Option<String>,
    pub is_cancelled: bool,
    pub is_room_change: bool,
    pub is_teacher_change: bool,
    pub room_new_id: Option<i32>,
    pub room_old_id: Option<i32>,
    pub teacher_new_id: Option<i32>,
    pub teacher_absent_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = schema::entry_class)]
pub struct EntryClass {
    pub entry_id: i32,
    pub class_id: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::entry_class)]
pub struct NewEntryClass {
    pub entry_id: i32,
    pub class_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::message)]
pub struct Message {
    pub id: i32,
    pub substitution_id: i32,
    pub message_index: i32,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::message)]
pub struct NewMessage {
    pub substitution_id: i32,
    pub message_index: i32,
    pub text: Option<String>,
}
