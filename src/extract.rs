//! Text extraction from the HTML fragments the portal puts into table cells.
//!
//! The monitor renders "new replaces old" as
//! `<span class="substMonitorSubstElem">NEW</span> (OLD)` or
//! `<span class="substMonitorSubstElem">NEW</span> (<span class="cancelStyle">OLD</span>)`,
//! and falls back to bare `NEW (OLD), OTHER` punctuation when no styling is
//! present. Structured spans always win over the punctuation heuristics.

use crate::utils::compile;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Style class of the span holding the substituted (new) value.
pub const SUBST_STYLE: &str = "substMonitorSubstElem";
/// Style class of the span holding a cancelled/absent value.
pub const CANCEL_STYLE: &str = "cancelStyle";

/// Placeholder the portal prints when there is no substitute teacher.
const NO_TEACHER: &str = "---";

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static SUBST_SPAN_RE: OnceLock<Regex> = OnceLock::new();
static CANCEL_SPAN_RE: OnceLock<Regex> = OnceLock::new();
static PAREN_RE: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    compile(&TAG_RE, r"<[^>]+>")
}

fn subst_span_regex() -> &'static Regex {
    compile(&SUBST_SPAN_RE, r#"class="substMonitorSubstElem">([^<]+)</span>"#)
}

fn cancel_span_regex() -> &'static Regex {
    compile(&CANCEL_SPAN_RE, r#"class="cancelStyle">([^<]+)</span>"#)
}

fn paren_regex() -> &'static Regex {
    compile(&PAREN_RE, r"\(([^()]+)\)")
}

fn decode_entities(cell: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(cell)
}

fn strip_tags(text: &str) -> String {
    tag_regex().replace_all(text, "").into_owned()
}

/// Trimmed, or `None` when nothing is left.
fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| non_blank(m.as_str()))
}

/// Decode HTML entities and remove every tag. Whitespace is left alone.
pub fn plain_text(cell: &str) -> String {
    if cell.is_empty() {
        return String::new();
    }
    strip_tags(&decode_entities(cell))
}

/// `(substituted_room, original_room)` of a room cell.
///
/// The original room is the first parenthesized text of the decoded cell,
/// looked up independently of the substitution span. Markup inside the
/// parentheses is dropped so a struck-through room still yields its code.
pub fn extract_room_info(cell: &str) -> (Option<String>, Option<String>) {
    if cell.is_empty() {
        return (None, None);
    }
    let text = decode_entities(cell);

    let new_room = first_capture(subst_span_regex(), &text);
    let old_room = paren_regex()
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| non_blank(&strip_tags(m.as_str())));

    (new_room, old_room)
}

/// `(substituted_teacher, absent_teacher)` of a teacher cell.
///
/// Handles
/// - `<span class="substMonitorSubstElem">HEMA</span> (<span class="cancelStyle">KING</span>)`
/// - `BADE (KEIL)` and plain `BADE`
/// - `--- (KEIL), BURG, GEIB` where only the absent teacher is known
pub fn extract_teacher_info(cell: &str) -> (Option<String>, Option<String>) {
    if cell.is_empty() {
        return (None, None);
    }
    let text = decode_entities(cell);
    let plain = strip_tags(&text);
    let plain = plain.trim();

    let new_teacher = first_capture(subst_span_regex(), &text).or_else(|| {
        let before_paren = plain.split('(').next().unwrap_or_default();
        let base = before_paren.split(',').next().unwrap_or_default();
        non_blank(base)
    });

    let absent_teacher = first_capture(cancel_span_regex(), &text).or_else(|| {
        paren_regex()
            .captures(plain)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().split(',').next())
            .and_then(non_blank)
    });

    let new_teacher = new_teacher.filter(|t| t != NO_TEACHER);
    (new_teacher, absent_teacher)
}
