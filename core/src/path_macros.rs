//! Macros for building field-message paths.

/// Build a [`FieldMessagePath`](crate::message::FieldMessagePath) from keys and indices.
///
/// String literals become key segments and integer literals become index
/// segments.
///
/// # Example
///
/// ```
/// use formwire_core::field_path;
///
/// let root = field_path![];
/// let street = field_path!["addresses", 0, "street"];
///
/// assert!(root.is_empty());
/// assert_eq!(street.to_string(), "addresses[0].street");
/// ```
#[macro_export]
macro_rules! field_path {
    () => {
        $crate::message::FieldMessagePath::root()
    };
    ($($segment:expr),+ $(,)?) => {
        $crate::message::FieldMessagePath::from_segments([
            $($crate::message::PathSegment::from($segment)),+
        ])
    };
}
