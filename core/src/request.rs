//! Outbound requests and inbound responses.
//!
//! A [`Request`] is immutable once built: every `with_*` method consumes the
//! value and returns a decorated copy that keeps the same [`RequestId`]. The id
//! is the only handle used to cancel a request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Header map. Names are stored lowercase.
pub type Headers = BTreeMap<String, String>;

/// Process-unique request identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Wire name of the method
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether payloads for this method travel in the body rather than the query
    #[must_use]
    pub const fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar query-string value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// `true` / `false`
    Bool(bool),
    /// Whole number
    Integer(i64),
    /// Floating-point number
    Float(f64),
    /// Text
    Text(String),
}

impl QueryValue {
    /// Convert a JSON scalar. Returns `None` for null, arrays and objects.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(Self::Bool(*flag)),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float)),
            serde_json::Value::String(text) => Some(Self::Text(text.clone())),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Float(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for QueryValue {
    fn from(number: i64) -> Self {
        Self::Integer(number)
    }
}

impl From<f64> for QueryValue {
    fn from(number: f64) -> Self {
        Self::Float(number)
    }
}

impl From<&str> for QueryValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// An outbound request.
///
/// # Example
///
/// ```
/// use formwire_core::request::{Method, Request};
/// use serde_json::json;
///
/// let request = Request::new(Method::Post, "/v1/users")
///     .with_header("X-Client", "web")
///     .with_body(json!({"username": "ada"}));
///
/// let authed = request.clone().with_bearer_token("secret");
///
/// assert_eq!(authed.id(), request.id());
/// assert!(request.header("authorization").is_none());
/// assert_eq!(authed.header("authorization"), Some("Bearer secret"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: RequestId,
    url: String,
    method: Method,
    headers: Headers,
    query: BTreeMap<String, QueryValue>,
    body: Option<serde_json::Value>,
}

impl Request {
    /// Create a request with a freshly generated id
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            url: url.into(),
            method,
            headers: Headers::new(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    /// Add or replace a header
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Add or replace a query parameter
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the `authorization` header to a bearer token
    #[must_use]
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("authorization", value)
    }

    /// Cancellation handle of this request
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Target URL, absolute or relative to a transport's base URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// All headers
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Query parameters
    #[must_use]
    pub const fn query(&self) -> &BTreeMap<String, QueryValue> {
        &self.query
    }

    /// JSON body, if any
    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A reply actually received from a server.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lowercase
    pub headers: Headers,
    /// Decoded body: JSON when parseable, otherwise a string, `null` when empty
    pub body: serde_json::Value,
}

impl Response {
    /// Create a response without headers
    #[must_use]
    pub const fn new(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body,
        }
    }

    /// Add or replace a header
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is in the 2xx family
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids_are_unique() {
        let first = Request::new(Method::Get, "/a");
        let second = Request::new(Method::Get, "/a");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_decorating_keeps_id_and_leaves_original_untouched() {
        let original = Request::new(Method::Get, "/v1/users").with_query("page", 2_i64);
        let decorated = original.clone().with_header("X-Trace", "abc");

        assert_eq!(original.id(), decorated.id());
        assert!(original.headers().is_empty());
        assert_eq!(decorated.header("x-trace"), Some("abc"));
        assert_eq!(decorated.query().get("page"), Some(&QueryValue::Integer(2)));
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let request = Request::new(Method::Get, "/")
            .with_header("Content-Type", "text/plain")
            .with_header("content-type", "application/json");

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_query_value_from_json() {
        assert_eq!(QueryValue::from_json(&json!(3)), Some(QueryValue::Integer(3)));
        assert_eq!(QueryValue::from_json(&json!(1.5)), Some(QueryValue::Float(1.5)));
        assert_eq!(QueryValue::from_json(&json!("x")), Some(QueryValue::from("x")));
        assert_eq!(QueryValue::from_json(&json!(true)), Some(QueryValue::Bool(true)));
        assert_eq!(QueryValue::from_json(&json!(null)), None);
        assert_eq!(QueryValue::from_json(&json!([1])), None);
    }

    #[test]
    fn test_method_body_placement() {
        assert!(Method::Post.carries_body());
        assert!(Method::Patch.carries_body());
        assert!(!Method::Get.carries_body());
        assert!(!Method::Delete.carries_body());
    }

    #[test]
    fn test_response_success_family() {
        assert!(Response::new(204, json!(null)).is_success());
        assert!(!Response::new(302, json!(null)).is_success());
        assert!(!Response::new(422, json!(null)).is_success());
    }
}
