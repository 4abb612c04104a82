//! Builders for versioned response bodies and messages.

use formwire_core::message::{FieldMessage, FieldMessagePath, Message, Severity};
use serde_json::{Value, json};

/// Body of a successful reply carrying `data`
#[must_use]
pub fn success_body(data: Value) -> Value {
    json!({
        "success": true,
        "fieldMessages": [],
        "generalMessages": [],
        "data": data,
    })
}

/// Body of a failed reply carrying field and general messages
#[must_use]
pub fn error_body(field_messages: &[FieldMessage], general_messages: &[Message]) -> Value {
    json!({
        "success": false,
        "fieldMessages": field_messages,
        "generalMessages": general_messages,
    })
}

/// Error-severity message whose translation id is `error.<id>`
#[must_use]
pub fn message(id: &str) -> Message {
    Message::new(id, Severity::Error, format!("error.{id}"))
}

/// Error-severity field message at `path`
#[must_use]
pub fn field_message(path: FieldMessagePath, id: &str) -> FieldMessage {
    FieldMessage::new(path, message(id))
}
