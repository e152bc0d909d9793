//! Event record parsing
//!
//! Each event arrives as one line of the form `data: {json}`. The JSON object
//! is inspected field by field rather than deserialized into a fixed shape:
//! the responder mixes three kinds of records on the same channel and marks
//! them with loosely typed flags (`"done": true`, `"error": 1`, ...).

use crate::error::RecordError;
use serde_json::Value;

/// Literal prefix of every event line
pub const EVENT_PREFIX: &str = "data: ";

/// Field names accepted for the final text of a completion record
const FINAL_TEXT_FIELDS: [&str; 3] = ["response", "final_text", "message"];

/// One decoded logical event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Incremental text fragment
    Chunk { text: String },

    /// Completion; may carry the full final text and persistence metadata
    Done {
        final_text: Option<String>,
        message_id: Option<String>,
        created_at: Option<String>,
    },

    /// The responder failed mid-stream
    Error { message: Option<String> },
}

impl Record {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Record::Done { .. } | Record::Error { .. })
    }
}

/// Parse a single complete line.
///
/// Returns `Ok(None)` for lines that carry no event (blank lines, comments,
/// other SSE fields, JSON without a recognised flag) and `Err` when the
/// payload after the prefix is not valid JSON.
pub fn parse_line(line: &str) -> Result<Option<Record>, RecordError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }

    let json: Value = serde_json::from_str(payload)?;
    Ok(classify(&json))
}

fn classify(json: &Value) -> Option<Record> {
    if json.get("error").is_some_and(is_truthy) {
        return Some(Record::Error {
            message: non_empty_str(json.get("message")),
        });
    }

    if json.get("done").is_some_and(is_truthy) {
        let final_text = FINAL_TEXT_FIELDS
            .iter()
            .find_map(|field| non_empty_str(json.get(*field)));
        return Some(Record::Done {
            final_text,
            message_id: json.get("message_id").and_then(id_to_string),
            created_at: non_empty_str(json.get("created_at")),
        });
    }

    non_empty_str(json.get("chunk")).map(|text| Record::Chunk { text })
}

/// Truthiness as the responder's dynamic runtime sees it
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
