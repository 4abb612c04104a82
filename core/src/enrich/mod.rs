//! Message enrichment: attach field messages to the leaves of a state tree.
//!
//! A state tree is any value implementing [`Enrich`]. Addressable leaves are
//! [`Field`] values. A leaf that declares a `path_part` receives exactly the
//! messages whose path equals the enclosing prefix followed by that part; a
//! leaf without one is left alone. Composites that declare their own path
//! part ([`Scoped`], or a derived struct with an `#[enrich(path_part)]` field)
//! extend the prefix for everything beneath them.
//!
//! Enrichment never mutates its input. It rebuilds the tree and replaces the
//! `messages` of every addressed leaf, so applying it twice with the same
//! messages gives the same tree, and applying it with no messages clears
//! every addressed leaf.
//!
//! Untyped trees are supported through the [`Enrich`] impl for
//! [`serde_json::Value`]; see [`LeafKind`] for the leaf shape it recognizes.
//!
//! ## Example
//!
//! ```
//! use formwire_core::enrich::{Field, Scoped, enrich};
//! use formwire_core::field_path;
//! use formwire_core::message::{FieldMessage, Message, Severity};
//!
//! let address = Scoped::at(
//!     field_path!["address"],
//!     vec![Field::at(String::new(), field_path!["street"])],
//! );
//!
//! let taken = Message::new("m1", Severity::Error, "address.streetRequired");
//! let messages = vec![FieldMessage::new(field_path!["address", "street"], taken.clone())];
//!
//! let enriched = enrich(&address, &messages, &field_path![]);
//!
//! assert_eq!(enriched.inner[0].messages, vec![taken]);
//! assert!(address.inner[0].messages.is_empty());
//! ```

mod field;
mod value;

pub use field::{Field, Scoped};
pub use value::{KIND_KEY, LeafKind, LeafTag, MESSAGES_KEY, PATH_PART_KEY, path_part_of};

use crate::message::{FieldMessage, FieldMessagePath, Message};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

/// Messages plus the path prefix of the node being enriched.
#[derive(Debug, Clone)]
pub struct EnrichContext<'a> {
    messages: &'a [FieldMessage],
    prefix: FieldMessagePath,
}

impl<'a> EnrichContext<'a> {
    /// Context at the root path
    #[must_use]
    pub fn new(messages: &'a [FieldMessage]) -> Self {
        Self {
            messages,
            prefix: FieldMessagePath::root(),
        }
    }

    /// Replace the prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: FieldMessagePath) -> Self {
        self.prefix = prefix;
        self
    }

    /// Path of the enclosing composite
    #[must_use]
    pub const fn prefix(&self) -> &FieldMessagePath {
        &self.prefix
    }

    /// All candidate messages
    #[must_use]
    pub const fn messages(&self) -> &'a [FieldMessage] {
        self.messages
    }

    /// Context for the subtree of a composite with path part `part`
    #[must_use]
    pub fn descend(&self, part: &FieldMessagePath) -> Self {
        Self {
            messages: self.messages,
            prefix: self.prefix.join(part),
        }
    }

    /// [`descend`](Self::descend) when `part` is present, otherwise an unchanged copy
    #[must_use]
    pub fn within(&self, part: Option<&FieldMessagePath>) -> Self {
        part.map_or_else(|| self.clone(), |part| self.descend(part))
    }

    /// Messages addressed to the leaf with path part `part`, in input order
    #[must_use]
    pub fn messages_for(&self, part: &FieldMessagePath) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|field_message| field_message.path.is_join_of(&self.prefix, part))
            .map(|field_message| field_message.message.clone())
            .collect()
    }
}

/// A node of a state tree that can receive field messages.
///
/// Implement it with `#[derive(Enrich)]` from `formwire-macros`, or by hand
/// for nodes with custom layout.
pub trait Enrich: Sized {
    /// Rebuild this node with leaf messages derived from `ctx`
    #[must_use]
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self;

    /// Push the full path of every addressable leaf under this node
    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>);
}

/// Something that may hold a composite's path part.
///
/// Used by the derive macro for fields marked `#[enrich(path_part)]`.
pub trait AsPathPart {
    /// The path part, if declared
    fn as_path_part(&self) -> Option<&FieldMessagePath>;
}

impl AsPathPart for FieldMessagePath {
    fn as_path_part(&self) -> Option<&FieldMessagePath> {
        Some(self)
    }
}

impl AsPathPart for Option<FieldMessagePath> {
    fn as_path_part(&self) -> Option<&FieldMessagePath> {
        self.as_ref()
    }
}

/// Enrich `tree` with `messages`, treating `prefix` as the tree's own path.
#[must_use]
pub fn enrich<T: Enrich>(tree: &T, messages: &[FieldMessage], prefix: &FieldMessagePath) -> T {
    let ctx = EnrichContext::new(messages).with_prefix(prefix.clone());
    tree.enrich(&ctx)
}

/// Field messages that no addressable leaf of `tree` would receive.
///
/// These are typically shown through the general-message sink instead.
#[must_use]
pub fn unmatched_messages<'m, T: Enrich>(
    tree: &T,
    messages: &'m [FieldMessage],
    prefix: &FieldMessagePath,
) -> Vec<&'m FieldMessage> {
    let mut addresses = Vec::new();
    tree.addresses(prefix, &mut addresses);
    let addresses: HashSet<FieldMessagePath> = addresses.into_iter().collect();

    messages
        .iter()
        .filter(|field_message| !addresses.contains(&field_message.path))
        .collect()
}

impl<T: Enrich> Enrich for Vec<T> {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        self.iter().map(|item| item.enrich(ctx)).collect()
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        for item in self {
            item.addresses(prefix, out);
        }
    }
}

impl<T: Enrich> Enrich for Option<T> {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        self.as_ref().map(|inner| inner.enrich(ctx))
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        if let Some(inner) = self {
            inner.addresses(prefix, out);
        }
    }
}

impl<T: Enrich> Enrich for Box<T> {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        Self::new((**self).enrich(ctx))
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        (**self).addresses(prefix, out);
    }
}

impl<K: Clone + Ord, V: Enrich> Enrich for BTreeMap<K, V> {
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.enrich(ctx)))
            .collect()
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        for value in self.values() {
            value.addresses(prefix, out);
        }
    }
}

impl<K, V, S> Enrich for HashMap<K, V, S>
where
    K: Clone + Eq + Hash,
    V: Enrich,
    S: BuildHasher + Default,
{
    fn enrich(&self, ctx: &EnrichContext<'_>) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.enrich(ctx)))
            .collect()
    }

    fn addresses(&self, prefix: &FieldMessagePath, out: &mut Vec<FieldMessagePath>) {
        for value in self.values() {
            value.addresses(prefix, out);
        }
    }
}

/// Values with no addressable leaves pass through unchanged.
macro_rules! impl_enrich_passthrough {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Enrich for $ty {
                fn enrich(&self, _ctx: &EnrichContext<'_>) -> Self {
                    self.clone()
                }

                fn addresses(&self, _prefix: &FieldMessagePath, _out: &mut Vec<FieldMessagePath>) {}
            }
        )*
    };
}

impl_enrich_passthrough!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
    Message,
    FieldMessagePath,
);
