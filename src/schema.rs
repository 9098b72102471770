//! Diesel schema declarations.
//!
//! `substitutions` is the raw day store and is created by the embedded
//! migrations. Every other table is derived and gets dropped and recreated by
//! [`crate::db::derived::reset_derived_schema`] at the start of a
//! normalization run.

diesel::table! {
    substitutions (id) {
        id -> Integer,
        date_yyyymmdd -> Integer,
        fetched_at -> Timestamp,
        raw_json -> Text,
    }
}

diesel::table! {
    teacher (id) {
        id -> Integer,
        code -> Text,
    }
}

diesel::table! {
    room (id) {
        id -> Integer,
        code -> Text,
    }
}

diesel::table! {
    class (id) {
        id -> Integer,
        code -> Text,
    }
}

diesel::table! {
    subject (id) {
        id -> Integer,
        code -> Text,
    }
}

diesel::table! {
    substitution_entry (id) {
        id -> Integer,
        substitution_id -> Integer,
        row_index -> Integer,
        group_label -> Nullable<Text>,
        period_raw -> Nullable<Text>,
        period_start -> Nullable<Integer>,
        period_end -> Nullable<Integer>,
        time_start -> Nullable<Text>,
        time_end -> Nullable<Text>,
        subject_raw -> Nullable<Text>,
        info_flag -> Nullable<Text>,
        comment -> Nullable<Text>,
        is_cancelled -> Bool,
        is_room_change -> Bool,
        is_teacher_change -> Bool,
        room_new_id -> Nullable<Integer>,
        room_old_id -> Nullable<Integer>,
        teacher_new_id -> Nullable<Integer>,
        teacher_absent_id -> Nullable<Integer>,
    }
}

// Entries <-> classes (many-to-many)
diesel::table! {
    entry_class (entry_id, class_id) {
        entry_id -> Integer,
        class_id -> Integer,
    }
}

diesel::table! {
    message (id) {
        id -> Integer,
        substitution_id -> Integer,
        message_index -> Integer,
        text -> Nullable<Text>,
    }
}

diesel::joinable!(substitution_entry -> substitutions (substitution_id));
diesel::joinable!(message -> substitutions (substitution_id));
diesel::joinable!(entry_class -> substitution_entry (entry_id));
diesel::joinable!(entry_class -> class (class_id));

diesel::allow_tables_to_appear_in_same_query!(
    substitutions,
    teacher,
    room,
    class,
    subject,
    substitution_entry,
    entry_class,
    message,
);
