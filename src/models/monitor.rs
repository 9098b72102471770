//! Models for the substitution monitor payload served by the portal.
//!
//! Only the parts the normalizer reads are typed. Below the document root
//! everything is lenient: `null`, missing and wrongly shaped fields all read
//! as absent, so one odd field never costs the rest of the day.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Column positions inside `Row::data`.
pub mod columns {
    pub const PERIOD: usize = 0;
    pub const TIME: usize = 1;
    pub const CLASSES: usize = 2;
    pub const SUBJECT: usize = 3;
    pub const ROOM: usize = 4;
    pub const TEACHER: usize = 5;
    pub const INFO: usize = 6;
    pub const COMMENT: usize = 7;
}

/// Any value that does not fit `T` becomes `None`.
fn lenient<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(de)?;
    Ok(serde_json::from_value(value).ok())
}

/// Rows are kept one per source position; a row that is not an object reads
/// as an empty row.
fn lenient_rows<'de, D>(de: D) -> Result<Option<Vec<Row>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
        ),
        _ => None,
    })
}

/// Top-level document stored per day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DayDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub rows: Option<Vec<Row>>,
    #[serde(default, deserialize_with = "lenient")]
    pub message_data: Option<MessageData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageData {
    #[serde(default, deserialize_with = "lenient")]
    pub messages: Option<Vec<Value>>,
}

/// One table row. Cells are HTML fragments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default, deserialize_with = "lenient")]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<Vec<Value>>,
    /// Column key to style classes; a bare string counts as a single class.
    #[serde(default, deserialize_with = "lenient")]
    pub cell_classes: Option<BTreeMap<String, Value>>,
}

impl DayDocument {
    pub fn rows(&self) -> &[Row] {
        self.payload.as_ref().and_then(|p| p.rows.as_deref()).unwrap_or(&[])
    }

    pub fn messages(&self) -> &[Value] {
        self.payload
            .as_ref()
            .and_then(|p| p.message_data.as_ref())
            .and_then(|m| m.messages.as_deref())
            .unwrap_or(&[])
    }
}

impl Row {
    /// Cell at `idx` as a string; missing or non-string cells read as empty.
    pub fn cell(&self, idx: usize) -> &str {
        self.data
            .as_ref()
            .and_then(|cells| cells.get(idx))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// All string cells of the row, in order.
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.data.iter().flatten().filter_map(Value::as_str)
    }

    /// Every style class attached to any column of the row.
    pub fn style_classes(&self) -> impl Iterator<Item = &str> {
        self.cell_classes
            .iter()
            .flat_map(|m| m.values())
            .flat_map(|classes| {
                let (single, list) = match classes {
                    Value::String(s) => (Some(s.as_str()), None),
                    Value::Array(items) => (None, Some(items.iter().filter_map(Value::as_str))),
                    _ => (None, None),
                };
                single.into_iter().chain(list.into_iter().flatten())
            })
    }
}

/// Text stored for one day message.
///
/// Strings are taken as-is. Objects use their `text` field when it is a
/// non-empty string, otherwise the whole value is serialized so nothing is
/// dropped.
pub fn message_text(msg: &Value) -> String {
    match msg {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("text").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => msg.to_string(),
        },
        other => other.to_string(),
    }
}
