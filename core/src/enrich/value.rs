//! Enrichment of untyped JSON state trees.
//!
//! A JSON object is an addressable leaf when its `"kind"` names a
//! [`LeafKind`]. Its optional `"pathPart"` is an array of string and index
//! segments, and its `"messages"` is replaced by the matching messages in
//! wire shape. Every other object is a composite; when it carries a
//! `"pathPart"` of its own, that part extends the prefix for its children.

use super::{Enrich, EnrichContext};
use crate::message::{FieldMessagePath, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key holding a node's discriminant tag
pub const KIND_KEY: &str = "kind";
/// Key holding a node's path part
pub const PATH_PART_KEY: &str = "pathPart";
/// Key holding a leaf's messages
pub const MESSAGES_KEY: &str = "messages";

/// The closed set of leaf kinds the engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeafKind {
    /// Free text
    TextInput,
    /// Numeric input
    NumberInput,
    /// Boolean toggle
    Checkbox,
    /// Choice from a list
    Select,
    /// Calendar date
    DateInput,
    /// File upload
    FileInput,
}

impl LeafKind {
    /// Every leaf kind
    pub const ALL: [Self; 6] = [
        Self::TextInput,
        Self::NumberInput,
        Self::Checkbox,
        Self::Select,
        Self::DateInput,
        Self::FileInput,
    ];

    /// Value of `"kind"` for this leaf
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::TextInput => "textInput",
            Self::NumberInput => "numberInput",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::DateInput => "dateInput",
            Self::FileInput => "fileInput",
        }
    }

    /// Parse a `"kind"` value
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classification of a JSON object by its `"kind"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafTag<'a> {
    /// A recognized leaf
    Leaf(LeafKind),
    /// A string tag outside [`LeafKind`]; treated as a composite
    Unrecognized(&'a str),
    /// No string `"kind"`
    Untagged,
}

impl<'a> LeafTag<'a> {
    /// Classify an object
    #[must_use]
    pub fn of(object: &'a Map<String, Value>) -> Self {
        match object.get(KIND_KEY).and_then(Value::as_str) {
            Some(tag) => LeafKind::from_tag(tag).map_or(Self::Unrecognized(tag), Self::Leaf),
            None => Self::Untagged,
        }
    }
}

/// The object's `"pathPart"`, or `None` when absent or malformed
#[must_use]
pub fn path_part_of(object: &Map<String, Value>) -> Option<FieldMessagePath> {
    object
        .get(PATH_PART_KEY)
        .and_then(|part| FieldMessagePath::deserialize(part).ok())
}

fn messages_value(messages: &[Message]) -> Value {
    Value::Array(
        messages
            .iter()
            .filter_map(|message| serde_json::to_value(message).ok())
            .collect(),
    )
}

fn enrich_object(object: &Map<String, Value>, ctx: &EnrichContext<'_>) -> Map<String, Value> {
    let path_part = path_part_of(object);

    match LeafTag::of(object) {
        LeafTag::Leaf(_) => {
            let mut leaf = object.clone();
            if let Some(part) = path_part {
                leaf.insert(
                    MESSAGES_KEY.to_owned(),
                    messages_value(&ctx.messages_for(&part)),
                );
            }
            leaf
        },
        LeafTag::Unrecognized(_) | LeafTag::Untagged => {
            let ctx = ctx.within(path_part.as_ref());
            object
                .iter()
                .map(|(key, child)| (key.clone(), child.enrich(&ctx)))
                .collect()
        },
    }
}

impl Enrich for Value {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        match self {
            Self::Array(items) => Self::Array(items.iter().map(|item| item.enrich(ctx)).collect()),
            Self::Object(object) => Self::Object(enrich_object(object, ctx)),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => self.clone(),
        }
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        match self {
            Self::Array(items) => {
                for item in items {
                    item.addresses(prefix, out);
                }
            },
            Self::Object(object) => {
                let path_part = path_part_of(object);
                match (LeafTag::of(object), path_part) {
                    (LeafTag::Leaf(_), Some(part)) => out.push(prefix.join(&part)),
                    (LeafTag::Leaf(_), None) => {},
                    (_, part) => {
                        let prefix = part.map_or_else(|| prefix.clone(), |part| prefix.join(&part));
                        for child in object.values() {
                            child.addresses(&prefix, out);
                        }
                    },
                }
            },
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => {},
        }
    }
}
