//! Display messages and the paths that address them to fields.
//!
//! A [`Message`] is an opaque display payload: the core never interprets its
//! [`Translation`]. A [`FieldMessage`] pins a message to a location inside a
//! caller's state tree through a [`FieldMessagePath`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral information
    Info,
    /// Confirmation that something worked
    Success,
    /// Something needs attention but nothing failed
    Warning,
    /// Something failed
    Error,
}

impl Severity {
    /// Wire name of the severity
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a translatable string plus its placeholder values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    /// Translation key
    pub id: String,
    /// Values substituted into the translated string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholders: Option<BTreeMap<String, serde_json::Value>>,
}

impl Translation {
    /// Create a translation reference without placeholders
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            placeholders: None,
        }
    }
}

/// A display message.
///
/// # Example
///
/// ```
/// use formwire_core::message::{Message, Severity};
///
/// let message = Message::new("username-taken", Severity::Error, "signup.usernameTaken")
///     .with_placeholder("username", "ada");
///
/// assert_eq!(message.severity, Severity::Error);
/// assert_eq!(message.translation.id, "signup.usernameTaken");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique within one response
    pub id: String,
    /// How the message should be presented
    pub severity: Severity,
    /// What the message says
    pub translation: Translation,
}

impl Message {
    /// Create a message
    #[must_use]
    pub fn new(id: impl Into<String>, severity: Severity, translation_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            translation: Translation::new(translation_id),
        }
    }

    /// Add a placeholder value to the translation
    #[must_use]
    pub fn with_placeholder(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.translation
            .placeholders
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

/// One segment of a [`FieldMessagePath`]: an object key or an array index.
///
/// On the wire a segment is either a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array position
    Index(usize),
    /// Object key
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

/// Ordered segments locating a node inside a nested state tree.
///
/// Paths compare segment by segment; there is no prefix or wildcard matching.
/// Build them with [`field_path!`](crate::field_path):
///
/// ```
/// use formwire_core::field_path;
/// use formwire_core::message::PathSegment;
///
/// let path = field_path!["addresses", 0, "street"];
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.segments()[1], PathSegment::Index(0));
/// assert_eq!(path.to_string(), "addresses[0].street");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMessagePath(SmallVec<[PathSegment; 4]>);

impl FieldMessagePath {
    /// The empty path
    #[must_use]
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Build a path from segments
    #[must_use]
    pub fn from_segments(segments: impl IntoIterator<Item = PathSegment>) -> Self {
        Self(segments.into_iter().collect())
    }

    /// The segments of this path, outermost first
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one segment in place
    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    /// This path followed by `suffix`
    #[must_use]
    pub fn join(&self, suffix: &Self) -> Self {
        let mut joined = self.clone();
        joined.0.extend(suffix.0.iter().cloned());
        joined
    }

    /// Whether this path equals `prefix` followed by `suffix`, without allocating
    #[must_use]
    pub fn is_join_of(&self, prefix: &Self, suffix: &Self) -> bool {
        self.len() == prefix.len() + suffix.len()
            && self.0[..prefix.len()] == prefix.0[..]
            && self.0[prefix.len()..] == suffix.0[..]
    }
}

impl FromIterator<PathSegment> for FieldMessagePath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}

impl From<Vec<PathSegment>> for FieldMessagePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(SmallVec::from_vec(segments))
    }
}

impl fmt::Display for FieldMessagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(_) if position > 0 => write!(f, ".{segment}")?,
                _ => write!(f, "{segment}")?,
            }
        }
        Ok(())
    }
}

/// A message addressed to one location in a state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMessage {
    /// Where the message belongs
    pub path: FieldMessagePath,
    /// What to show there
    pub message: Message,
}

impl FieldMessage {
    /// Create a field message
    #[must_use]
    pub const fn new(path: FieldMessagePath, message: Message) -> Self {
        Self { path, message }
    }
}
