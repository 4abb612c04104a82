//! Versioned endpoint definitions.
//!
//! An [`Endpoint`] is implemented once per server operation. It names the
//! operation (method and path template), turns a typed payload into a
//! [`Request`], and turns a [`RequestOutcome`] back into a typed
//! [`ApiOutcome`].
//!
//! [`JsonEndpoint`] covers the common case of serde payloads and results.
//!
//! # Example
//!
//! ```
//! use formwire_core::endpoint::{Endpoint, JsonEndpoint};
//! use formwire_core::request::Method;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct RenameUser {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Renamed {
//!     name: String,
//! }
//!
//! let endpoint: JsonEndpoint<RenameUser, Renamed> =
//!     JsonEndpoint::new(Method::Patch, "/v1/users/{id}");
//!
//! let request = endpoint
//!     .encode(RenameUser { id: 7, name: "Ada".to_string() })
//!     .unwrap();
//!
//! assert_eq!(request.url(), "/v1/users/7");
//! assert_eq!(request.body(), Some(&serde_json::json!({"name": "Ada"})));
//! ```

use crate::envelope::{ApiOutcome, DecodeError, decode_outcome};
use crate::outcome::RequestOutcome;
use crate::request::{Method, QueryValue, Request};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors raised while encoding a payload or decoding a reply.
///
/// These are programming or contract errors, never expected conditions.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Payload could not be serialized
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// Path template names a parameter the payload lacks
    #[error("path template `{template}` needs parameter `{param}`")]
    MissingPathParam {
        /// The template being rendered
        template: String,
        /// The missing parameter
        param: String,
    },

    /// A path parameter or query field is not a scalar
    #[error("field `{field}` must be a string, number or boolean")]
    NonScalarField {
        /// Offending field
        field: String,
    },

    /// Path template has an unterminated `{`
    #[error("path template `{0}` has an unterminated parameter")]
    InvalidTemplate(String),

    /// Reply body does not fit the envelope
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// One server operation.
pub trait Endpoint: Send + Sync {
    /// Typed input
    type Payload: Send;
    /// Typed `data` of a success reply
    type Data: DeserializeOwned + Send;
    /// Typed `data` of an error reply
    type ErrorData: DeserializeOwned + Send;

    /// HTTP method of the operation
    fn method(&self) -> Method;

    /// Path template, e.g. `/v1/users/{id}`
    fn path_template(&self) -> &str;

    /// The status this operation answers with on success
    fn success_status(&self) -> u16 {
        200
    }

    /// Whether a reply status counts as success
    fn is_success_status(&self, status: u16) -> bool {
        status == self.success_status()
    }

    /// Build the wire request for a payload
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the payload cannot be expressed as a request.
    fn encode(&self, payload: Self::Payload) -> Result<Request, EndpointError>;

    /// Decode the outcome of a request built by [`encode`](Self::encode)
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Decode`] when a reply body is not a well-formed envelope.
    fn decode(
        &self,
        outcome: &RequestOutcome,
    ) -> Result<ApiOutcome<Self::Data, Self::ErrorData>, EndpointError> {
        Ok(decode_outcome(outcome, |status| {
            self.is_success_status(status)
        })?)
    }
}

/// A path with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Wrap a template string
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw template
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder names in order of appearance
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidTemplate`] for an unterminated `{`.
    pub fn params(&self) -> Result<Vec<&str>, EndpointError> {
        let mut params = Vec::new();
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| EndpointError::InvalidTemplate(self.0.clone()))?;
            params.push(&after[..close]);
            rest = &after[close + 1..];
        }
        Ok(params)
    }

    /// Fill placeholders from the fields of `payload`.
    ///
    /// Returns the rendered path and the payload with the consumed fields
    /// removed. Values are percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when a parameter is missing or not a scalar.
    pub fn render(
        &self,
        payload: serde_json::Value,
    ) -> Result<(String, serde_json::Value), EndpointError> {
        let params = self.params()?;
        if params.is_empty() {
            return Ok((self.0.clone(), payload));
        }

        let serde_json::Value::Object(mut fields) = payload else {
            return Err(EndpointError::MissingPathParam {
                template: self.0.clone(),
                param: params[0].to_owned(),
            });
        };

        let mut distinct: Vec<&str> = Vec::with_capacity(params.len());
        for param in params {
            if !distinct.contains(&param) {
                distinct.push(param);
            }
        }

        let mut path = self.0.clone();
        for param in &distinct {
            let value = fields
                .get(*param)
                .ok_or_else(|| EndpointError::MissingPathParam {
                    template: self.0.clone(),
                    param: (*param).to_owned(),
                })?;
            let scalar = QueryValue::from_json(value).ok_or_else(|| {
                EndpointError::NonScalarField {
                    field: (*param).to_owned(),
                }
            })?;
            let encoded = utf8_percent_encode(&scalar.to_string(), PATH_SEGMENT).to_string();
            path = path.replace(&format!("{{{param}}}"), &encoded);
        }
        for param in distinct {
            fields.remove(param);
        }

        Ok((path, serde_json::Value::Object(fields)))
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Endpoint whose payload and `data` are plain serde types.
///
/// Payload fields named in the path template fill the path. The remaining
/// fields become the JSON body for POST, PUT and PATCH, and the query string
/// for GET and DELETE (null fields are omitted there).
pub struct JsonEndpoint<P, D, E = serde_json::Value> {
    method: Method,
    template: PathTemplate,
    success_status: u16,
    _types: PhantomData<fn(P) -> (D, E)>,
}

impl<P, D, E> JsonEndpoint<P, D, E> {
    /// Create an endpoint that succeeds with status 200
    #[must_use]
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: PathTemplate::new(template),
            success_status: 200,
            _types: PhantomData,
        }
    }

    /// Change the success status (e.g. 201 for creation)
    #[must_use]
    pub const fn with_success_status(mut self, status: u16) -> Self {
        self.success_status = status;
        self
    }

    /// The endpoint's path template
    #[must_use]
    pub const fn template(&self) -> &PathTemplate {
        &self.template
    }
}

impl<P, D, E> Clone for JsonEndpoint<P, D, E> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            template: self.template.clone(),
            success_status: self.success_status,
            _types: PhantomData,
        }
    }
}

impl<P, D, E> fmt::Debug for JsonEndpoint<P, D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonEndpoint")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("success_status", &self.success_status)
            .finish()
    }
}

impl<P, D, E> Endpoint for JsonEndpoint<P, D, E>
where
    P: Serialize + Send,
    D: DeserializeOwned + Send,
    E: DeserializeOwned + Send,
{
    type Payload = P;
    type Data = D;
    type ErrorData = E;

    fn method(&self) -> Method {
        self.method
    }

    fn path_template(&self) -> &str {
        self.template.as_str()
    }

    fn success_status(&self) -> u16 {
        self.success_status
    }

    fn encode(&self, payload: P) -> Result<Request, EndpointError> {
        let value = serde_json::to_value(payload).map_err(EndpointError::Encode)?;
        let (path, rest) = self.template.render(value)?;
        let request = Request::new(self.method, path);

        if self.method.carries_body() {
            return Ok(match rest {
                serde_json::Value::Null => request,
                body => request.with_body(body),
            });
        }

        let serde_json::Value::Object(fields) = rest else {
            return Ok(request);
        };
        fields
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .try_fold(request, |request, (name, value)| {
                let scalar = QueryValue::from_json(&value)
                    .ok_or(EndpointError::NonScalarField { field: name.clone() })?;
                Ok(request.with_query(name, scalar))
            })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::request::Response;
    use serde::Deserialize;
    use serde_json::{Value, json};

    #[derive(Serialize)]
    struct Search {
        team: String,
        term: Option<String>,
        page: u32,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Created {
        id: u64,
    }

    #[test]
    fn test_get_payload_goes_to_query() {
        let endpoint: JsonEndpoint<Search, Value> =
            JsonEndpoint::new(Method::Get, "/v1/teams/{team}/members");

        let request = endpoint
            .encode(Search {
                team: "core devs".to_string(),
                term: None,
                page: 2,
            })
            .unwrap();

        assert_eq!(request.url(), "/v1/teams/core%20devs/members");
        assert_eq!(request.query().get("page"), Some(&QueryValue::Integer(2)));
        assert!(!request.query().contains_key("term"));
        assert!(!request.query().contains_key("team"));
        assert!(request.body().is_none());
    }

    #[test]
    fn test_post_payload_goes_to_body() {
        let endpoint: JsonEndpoint<Value, Created> =
            JsonEndpoint::new(Method::Post, "/v1/users").with_success_status(201);

        let request = endpoint
            .encode(json!({"username": "ada", "tags": ["a"]}))
            .unwrap();

        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.body(), Some(&json!({"username": "ada", "tags": ["a"]})));
        assert!(endpoint.is_success_status(201));
        assert!(!endpoint.is_success_status(200));
    }

    #[test]
    fn test_missing_path_param() {
        let endpoint: JsonEndpoint<Value, Value> = JsonEndpoint::new(Method::Delete, "/v1/users/{id}");
        let err = endpoint.encode(json!({"name": "x"})).unwrap_err();

        assert!(matches!(err, EndpointError::MissingPathParam { ref param, .. } if param == "id"));
    }

    #[test]
    fn test_repeated_placeholder_fills_every_occurrence() {
        let endpoint: JsonEndpoint<Value, Value> =
            JsonEndpoint::new(Method::Get, "/v1/users/{id}/friends/{id}");

        let request = endpoint.encode(json!({"id": 7, "page": 1})).unwrap();

        assert_eq!(request.url(), "/v1/users/7/friends/7");
        assert!(!request.query().contains_key("id"));
        assert_eq!(request.query().get("page"), Some(&QueryValue::Integer(1)));
    }

    #[test]
    fn test_path_values_are_percent_encoded() {
        let template = PathTemplate::new("/v1/files/{name}");

        let (path, rest) = template.render(json!({"name": "a/b c~d_e.f-g%"})).unwrap();

        assert_eq!(path, "/v1/files/a%2Fb%20c~d_e.f-g%25");
        assert_eq!(rest, json!({}));
    }

    #[test]
    fn test_nested_query_field_is_rejected() {
        let endpoint: JsonEndpoint<Value, Value> = JsonEndpoint::new(Method::Get, "/v1/users");
        let err = endpoint.encode(json!({"filter": {"a": 1}})).unwrap_err();

        assert!(matches!(err, EndpointError::NonScalarField { ref field } if field == "filter"));
    }

    #[test]
    fn test_unterminated_template() {
        let template = PathTemplate::new("/v1/users/{id");
        assert!(matches!(template.params(), Err(EndpointError::InvalidTemplate(_))));
    }

    #[test]
    fn test_decode_uses_success_status() {
        let endpoint: JsonEndpoint<Value, Created> =
            JsonEndpoint::new(Method::Post, "/v1/users").with_success_status(201);
        let request = endpoint.encode(json!({})).unwrap();
        let outcome = RequestOutcome::responded(
            request,
            Response::new(
                201,
                json!({"success": true, "fieldMessages": [], "generalMessages": [], "data": {"id": 3}}),
            ),
        );

        let decoded = endpoint.decode(&outcome).unwrap();
        assert!(decoded.is_success());
    }
}
