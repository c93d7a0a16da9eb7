//! Debezium change envelope decoding
//!
//! Accepts both the schema-wrapped form `{"schema": ..., "payload": {...}}`
//! and the bare payload produced with `schemas.enable=false`.

use crate::error::MalformedEvent;
use serde_json::Value;
use vecsync_core::{ChangeEvent, Operation, Record};

/// Decode raw message bytes
pub fn decode_bytes(bytes: &[u8], topic: &str) -> Result<ChangeEvent, MalformedEvent> {
    let raw: Value =
        serde_json::from_slice(bytes).map_err(|e| MalformedEvent::InvalidJson(e.to_string()))?;
    decode(&raw, topic)
}

/// Decode an already parsed envelope
pub fn decode(raw: &Value, topic: &str) -> Result<ChangeEvent, MalformedEvent> {
    let payload = match raw.get("payload") {
        Some(Value::Object(payload)) => payload,
        Some(_) => return Err(MalformedEvent::MissingPayload),
        None => match raw {
            Value::Object(root) if root.contains_key("op") => root,
            _ => return Err(MalformedEvent::MissingPayload),
        },
    };

    let operation = Operation::from_code(payload.get("op").and_then(Value::as_str));

    Ok(ChangeEvent {
        source_topic: topic.to_string(),
        operation,
        before: row_image(payload.get("before")),
        after: row_image(payload.get("after")),
    })
}

fn row_image(value: Option<&Value>) -> Option<Record> {
    value.and_then(Value::as_object).cloned()
}
