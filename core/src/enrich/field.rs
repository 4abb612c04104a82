//! Typed leaf and composite nodes.

use super::{Enrich, EnrichContext};
use crate::message::{FieldMessagePath, Message, Severity};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// An addressable leaf: a value plus the messages shown next to it.
///
/// A field without a `path_part` opted out of addressing and keeps whatever
/// messages it already has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field<T> {
    /// Current input value
    pub value: T,
    /// Path suffix relative to the enclosing composite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_part: Option<FieldMessagePath>,
    /// Messages attached by the last enrichment
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl<T> Field<T> {
    /// A field that is not addressable
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            value,
            path_part: None,
            messages: Vec::new(),
        }
    }

    /// A field addressed by `path_part`
    #[must_use]
    pub const fn at(value: T, path_part: FieldMessagePath) -> Self {
        Self {
            value,
            path_part: Some(path_part),
            messages: Vec::new(),
        }
    }

    /// Set the path part
    #[must_use]
    pub fn with_path_part(mut self, path_part: FieldMessagePath) -> Self {
        self.path_part = Some(path_part);
        self
    }

    /// Replace the value, keeping address and messages
    #[must_use]
    pub fn with_value(mut self, value: T) -> Self {
        self.value = value;
        self
    }

    /// Whether any attached message has error severity
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.severity == Severity::Error)
    }
}

impl<T: Clone> Enrich for Field<T> {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        let Some(part) = &self.path_part else {
            return self.clone();
        };
        Self {
            value: self.value.clone(),
            path_part: Some(part.clone()),
            messages: ctx.messages_for(part),
        }
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        if let Some(part) = &self.path_part {
            out.push(prefix.join(part));
        }
    }
}

/// A composite that extends the path prefix for everything inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoped<T> {
    /// Path suffix relative to the enclosing composite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_part: Option<FieldMessagePath>,
    /// Wrapped subtree
    pub inner: T,
}

impl<T> Scoped<T> {
    /// Wrap `inner` without extending the prefix
    #[must_use]
    pub const fn new(inner: T) -> Self {
        Self {
            path_part: None,
            inner,
        }
    }

    /// Wrap `inner` under `path_part`
    #[must_use]
    pub const fn at(path_part: FieldMessagePath, inner: T) -> Self {
        Self {
            path_part: Some(path_part),
            inner,
        }
    }

    /// Unwrap
    #[must_use]
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Enrich> Enrich for Scoped<T> {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        Self {
            path_part: self.path_part.clone(),
            inner: self.inner.enrich(&ctx.within(self.path_part.as_ref())),
        }
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        match &self.path_part {
            Some(part) => self.inner.addresses(&prefix.join(part), out),
            None => self.inner.addresses(prefix, out),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::field_path;
    use crate::message::FieldMessage;
    use serde_json::json;

    fn error(id: &str) -> Message {
        Message::new(id, Severity::Error, "error")
    }

    #[test]
    fn test_unaddressed_field_keeps_its_messages() {
        let mut field = Field::new("x".to_string());
        field.messages.push(error("stale"));
        let messages = vec![FieldMessage::new(field_path![], error("root"))];

        let enriched = field.enrich(&EnrichContext::new(&messages));

        assert_eq!(enriched, field);
    }

    #[test]
    fn test_addressed_field_replaces_messages() {
        let mut field = Field::at(0_i64, field_path!["age"]);
        field.messages.push(error("stale"));
        let messages = vec![FieldMessage::new(field_path!["age"], error("fresh"))];

        let enriched = field.enrich(&EnrichContext::new(&messages));

        assert_eq!(enriched.messages, vec![error("fresh")]);
        assert!(enriched.has_errors());
        assert_eq!(field.messages, vec![error("stale")]);
    }

    #[test]
    fn test_nested_scopes_compose_prefixes() {
        let tree = Scoped::at(
            field_path!["addresses"],
            vec![
                Scoped::at(field_path![0], Field::at(String::new(), field_path!["zip"])),
                Scoped::at(field_path![1], Field::at(String::new(), field_path!["zip"])),
            ],
        );
        let messages = vec![
            FieldMessage::new(field_path!["addresses", 1, "zip"], error("bad-zip")),
            FieldMessage::new(field_path!["addresses", "zip"], error("wrong-level")),
        ];

        let enriched = tree.enrich(&EnrichContext::new(&messages));

        assert!(enriched.inner[0].inner.messages.is_empty());
        assert_eq!(enriched.inner[1].inner.messages, vec![error("bad-zip")]);

        let mut addresses = Vec::new();
        tree.addresses(&field_path![], &mut addresses);
        assert_eq!(
            addresses,
            vec![
                field_path!["addresses", 0, "zip"],
                field_path!["addresses", 1, "zip"]
            ]
        );
    }

    #[test]
    fn test_field_wire_shape() {
        let field = Field::at(true, field_path!["terms"]);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"value": true, "pathPart": ["terms"], "messages": []})
        );
    }
}
