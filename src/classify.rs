//! Boolean change flags derived from a whole row.
//!
//! Each flag has its own signals and they are evaluated independently; a row
//! may be cancelled, room-changed and teacher-changed at once.

use crate::extract::{plain_text, CANCEL_STYLE};

/// Marker word for a dropped lesson.
const CANCELLED_MARKER: &str = "Entfall";
/// Marker phrase in the info column for a moved lesson.
const ROOM_CHANGE_MARKER: &str = "Raumänderung";

/// Cancelled if any cell reads "Entfall" or any column carries the cancel style.
pub fn is_cancelled<'a, C, S>(cells: C, style_classes: S) -> bool
where
    C: IntoIterator<Item = &'a str>,
    S: IntoIterator<Item = &'a str>,
{
    cells.into_iter().any(|cell| plain_text(cell).contains(CANCELLED_MARKER))
        || style_classes.into_iter().any(|class| class == CANCEL_STYLE)
}

/// Room change if the info column says so, or both rooms are known and differ.
pub fn is_room_change(info_flag: &str, room_new: Option<&str>, room_old: Option<&str>) -> bool {
    if plain_text(info_flag).contains(ROOM_CHANGE_MARKER) {
        return true;
    }
    matches!((room_new, room_old), (Some(new), Some(old)) if new != old)
}

/// Teacher change if both teachers are known and differ.
pub fn is_teacher_change(teacher_new: Option<&str>, teacher_absent: Option<&str>) -> bool {
    matches!((teacher_new, teacher_absent), (Some(new), Some(absent)) if new != absent)
}
