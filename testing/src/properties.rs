//! proptest strategies for field paths, messages and state trees.
//!
//! Keys and indices are drawn from a deliberately small alphabet so that
//! generated messages often collide with generated leaf paths.

use formwire_core::enrich::{KIND_KEY, LeafKind, MESSAGES_KEY, PATH_PART_KEY};
use formwire_core::message::{FieldMessage, FieldMessagePath, Message, PathSegment, Severity};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// A key from `{a, b, c}` or an index below 3
pub fn path_segment() -> impl Strategy<Value = PathSegment> {
    prop_oneof![
        (0_usize..3).prop_map(PathSegment::Index),
        prop::sample::select(vec!["a", "b", "c"]).prop_map(PathSegment::from),
    ]
}

/// A path of at most `max_len` segments
pub fn field_path(max_len: usize) -> impl Strategy<Value = FieldMessagePath> {
    prop::collection::vec(path_segment(), 0..=max_len).prop_map(FieldMessagePath::from)
}

/// Any severity
pub fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Info),
        Just(Severity::Success),
        Just(Severity::Warning),
        Just(Severity::Error),
    ]
}

/// A message with a short id
pub fn message() -> impl Strategy<Value = Message> {
    ("[a-z]{1,6}", severity()).prop_map(|(id, severity)| {
        let translation = format!("msg.{id}");
        Message::new(id, severity, translation)
    })
}

/// Up to eight field messages with paths of up to four segments
pub fn field_messages() -> impl Strategy<Value = Vec<FieldMessage>> {
    prop::collection::vec(
        (field_path(4), message()).prop_map(|(path, message)| FieldMessage::new(path, message)),
        0..8,
    )
}

fn path_part_value(path: &FieldMessagePath) -> Value {
    serde_json::to_value(path).unwrap_or(Value::Null)
}

/// An addressable JSON leaf, with or without a path part
pub fn json_leaf() -> impl Strategy<Value = Value> {
    (
        prop::sample::select(LeafKind::ALL.to_vec()),
        prop::option::of(field_path(2)),
        prop::collection::vec(message(), 0..2),
    )
        .prop_map(|(kind, path_part, stale)| {
            let mut leaf = Map::new();
            leaf.insert(KIND_KEY.to_owned(), Value::from(kind.tag()));
            if let Some(path_part) = path_part {
                leaf.insert(PATH_PART_KEY.to_owned(), path_part_value(&path_part));
            }
            leaf.insert(
                MESSAGES_KEY.to_owned(),
                serde_json::to_value(stale).unwrap_or(Value::Null),
            );
            leaf.insert("value".to_owned(), Value::from(""));
            Value::Object(leaf)
        })
}

/// A JSON state tree of leaves, primitives, arrays and composites.
///
/// Composites may carry their own path part and may be tagged with a kind
/// outside [`LeafKind`].
pub fn json_state_tree() -> impl Strategy<Value = Value> {
    let base = prop_oneof![
        3 => json_leaf(),
        1 => Just(Value::Null),
        1 => any::<bool>().prop_map(Value::from),
        1 => "[a-z]{0,4}".prop_map(Value::from),
    ];

    base.prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            (
                prop::collection::btree_map("[a-d]", inner, 0..4),
                prop::option::of(field_path(2)),
                any::<bool>(),
            )
                .prop_map(|(children, path_part, tagged)| {
                    let mut composite: Map<String, Value> = children.into_iter().collect();
                    if let Some(path_part) = path_part {
                        composite.insert(PATH_PART_KEY.to_owned(), path_part_value(&path_part));
                    }
                    if tagged {
                        composite.insert(KIND_KEY.to_owned(), Value::from("group"));
                    }
                    Value::Object(composite)
                }),
        ]
    })
}
