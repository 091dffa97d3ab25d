//! Helpers for constructing summary payloads.

use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Payload key joining a summary point to its full document.
pub const DOC_ID_KEY: &str = "doc_id";
/// Payload key holding the summary text.
pub const TEXT_KEY: &str = "text";

/// Build the payload object stored alongside each summary vector.
pub(crate) fn build_payload(doc_id: &str, text: &str, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert(DOC_ID_KEY.into(), Value::String(doc_id.to_string()));
    payload.insert(TEXT_KEY.into(), Value::String(text.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Current UTC time formatted as RFC3339, or an empty string if formatting fails.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Pull `(doc_id, text)` out of a stored payload.
pub fn read_summary(payload: &Map<String, Value>) -> Option<(String, String)> {
    let doc_id = payload.get(DOC_ID_KEY)?.as_str()?.to_string();
    let text = payload
        .get(TEXT_KEY)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((doc_id, text))
}
