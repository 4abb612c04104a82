//! Property tests for the enrichment engine.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use formwire_core::enrich::{
    Enrich, EnrichContext, Field, LeafTag, MESSAGES_KEY, enrich, path_part_of, unmatched_messages,
};
use formwire_core::field_path;
use formwire_core::message::{FieldMessage, FieldMessagePath, Message};
use formwire_testing::properties::{field_messages, field_path, json_state_tree, message};
use proptest::prelude::*;
use serde_json::Value;

/// Every addressable leaf in `tree` as (full path, messages), in walk order.
///
/// Written independently of the engine: walks the raw JSON and joins path
/// parts by hand.
fn leaves(tree: &Value, prefix: &FieldMessagePath, out: &mut Vec<(FieldMessagePath, Value)>) {
    match tree {
        Value::Array(items) => {
            for item in items {
                leaves(item, prefix, out);
            }
        },
        Value::Object(object) => {
            let part = path_part_of(object);
            if let LeafTag::Leaf(_) = LeafTag::of(object) {
                if let Some(part) = part {
                    out.push((prefix.join(&part), object[MESSAGES_KEY].clone()));
                }
                return;
            }
            let prefix = part.map_or_else(|| prefix.clone(), |part| prefix.join(&part));
            for child in object.values() {
                leaves(child, &prefix, out);
            }
        },
        _ => {},
    }
}

fn expected_messages(messages: &[FieldMessage], path: &FieldMessagePath) -> Value {
    let matched: Vec<&Message> = messages
        .iter()
        .filter(|field_message| &field_message.path == path)
        .map(|field_message| &field_message.message)
        .collect();
    serde_json::to_value(matched).unwrap()
}

// ============================================================================
// JSON trees
// ============================================================================

proptest! {
    #[test]
    fn enrich_is_idempotent(tree in json_state_tree(), messages in field_messages()) {
        let root = field_path![];
        let once = enrich(&tree, &messages, &root);
        let twice = enrich(&once, &messages, &root);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn leaves_receive_exactly_their_messages(
        tree in json_state_tree(),
        messages in field_messages(),
        prefix in field_path(1),
    ) {
        let enriched = enrich(&tree, &messages, &prefix);

        let mut found = Vec::new();
        leaves(&enriched, &prefix, &mut found);
        for (path, attached) in found {
            prop_assert_eq!(attached, expected_messages(&messages, &path));
        }
    }

    #[test]
    fn empty_messages_clear_every_addressed_leaf(tree in json_state_tree()) {
        let enriched = enrich(&tree, &[], &field_path![]);

        let mut found = Vec::new();
        leaves(&enriched, &field_path![], &mut found);
        for (_, attached) in found {
            prop_assert_eq!(attached, Value::Array(vec![]));
        }
    }

    #[test]
    fn input_tree_is_never_mutated(tree in json_state_tree(), messages in field_messages()) {
        let before = tree.clone();
        let _ = enrich(&tree, &messages, &field_path![]);
        prop_assert_eq!(tree, before);
    }

    #[test]
    fn unmatched_messages_are_exactly_the_unaddressed_ones(
        tree in json_state_tree(),
        messages in field_messages(),
    ) {
        let mut found = Vec::new();
        leaves(&tree, &field_path![], &mut found);
        let addressed: Vec<FieldMessagePath> = found.into_iter().map(|(path, _)| path).collect();

        let unmatched = unmatched_messages(&tree, &messages, &field_path![]);
        let expected: Vec<&FieldMessage> = messages
            .iter()
            .filter(|field_message| !addressed.contains(&field_message.path))
            .collect();

        prop_assert_eq!(unmatched, expected);
    }
}

// ============================================================================
// Typed trees
// ============================================================================

proptest! {
    #[test]
    fn typed_field_matches_path_exactly(
        part in field_path(3),
        prefix in field_path(2),
        messages in field_messages(),
        stale in prop::collection::vec(message(), 0..3),
    ) {
        let mut field = Field::at(0_u8, part.clone());
        field.messages = stale;

        let ctx = EnrichContext::new(&messages).with_prefix(prefix.clone());
        let enriched = field.enrich(&ctx);

        let full = prefix.join(&part);
        let expected: Vec<Message> = messages
            .iter()
            .filter(|field_message| field_message.path == full)
            .map(|field_message| field_message.message.clone())
            .collect();
        prop_assert_eq!(enriched.messages, expected);
        prop_assert_eq!(enriched.value, 0);
    }

    #[test]
    fn typed_enrich_is_idempotent(
        parts in prop::collection::vec(prop::option::of(field_path(2)), 0..5),
        messages in field_messages(),
    ) {
        let tree: Vec<Field<u8>> = parts
            .into_iter()
            .map(|part| match part {
                Some(part) => Field::at(1, part),
                None => Field::new(1),
            })
            .collect();

        let once = enrich(&tree, &messages, &field_path![]);
        let twice = enrich(&once, &messages, &field_path![]);
        prop_assert_eq!(once, twice);
    }
}
