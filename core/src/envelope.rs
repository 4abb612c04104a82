//! The versioned response envelope and its typed decoding.
//!
//! Every versioned endpoint answers with the same JSON wrapper:
//!
//! ```json
//! {
//!   "success": false,
//!   "fieldMessages": [{"path": ["username"], "message": {"id": "...", "severity": "error", "translation": {"id": "..."}}}],
//!   "generalMessages": [],
//!   "data": null
//! }
//! ```
//!
//! The field names are the compatibility boundary with the server and must
//! not change.

use crate::enrich::{Enrich, EnrichContext};
use crate::message::{FieldMessage, FieldMessagePath, Message};
use crate::outcome::{OutcomeKind, RequestOutcome};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message lists present on every versioned response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Server's own verdict
    pub success: bool,
    /// Messages addressed to fields of the request's input
    pub field_messages: Vec<FieldMessage>,
    /// Messages not tied to a field
    pub general_messages: Vec<Message>,
}

/// Full wire body of a versioned response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Common message lists
    #[serde(flatten)]
    pub messages: MessageEnvelope,
    /// Endpoint-specific payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Typed result of a versioned endpoint whose server replied.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedResult<T, E> {
    /// The reply carried the endpoint's success status
    Success {
        /// Decoded `data`
        data: T,
        /// Envelope messages
        messages: MessageEnvelope,
    },
    /// Any other status
    Error {
        /// Decoded `data` of the error reply
        error: E,
        /// Envelope messages
        messages: MessageEnvelope,
    },
}

impl<T, E> VersionedResult<T, E> {
    /// Whether this is the success variant
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Envelope messages of either variant
    #[must_use]
    pub const fn messages(&self) -> &MessageEnvelope {
        match self {
            Self::Success { messages, .. } | Self::Error { messages, .. } => messages,
        }
    }

    /// Success data, if any
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }
}

/// What a caller gets back from a versioned endpoint.
///
/// Cancellation and connectivity failure are propagated as-is, never forced
/// into the success/error classification, so a caller can tell "no server
/// answer" apart from "server said no".
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T, E> {
    /// The server replied and the body decoded
    Completed(VersionedResult<T, E>),
    /// The request was cancelled
    Cancelled,
    /// No reply was received
    ConnectionFailed,
}

impl<T, E> ApiOutcome<T, E> {
    /// Envelope messages, when the server replied
    #[must_use]
    pub const fn envelope(&self) -> Option<&MessageEnvelope> {
        match self {
            Self::Completed(result) => Some(result.messages()),
            Self::Cancelled | Self::ConnectionFailed => None,
        }
    }

    /// Field messages of the reply, empty when there was none
    #[must_use]
    pub fn field_messages(&self) -> &[FieldMessage] {
        self.envelope()
            .map(|envelope| envelope.field_messages.as_slice())
            .unwrap_or_default()
    }

    /// General messages of the reply, empty when there was none
    #[must_use]
    pub fn general_messages(&self) -> &[Message] {
        self.envelope()
            .map(|envelope| envelope.general_messages.as_slice())
            .unwrap_or_default()
    }

    /// Success data, if the server replied with the success status
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Completed(result) => result.into_data(),
            Self::Cancelled | Self::ConnectionFailed => None,
        }
    }

    /// Attach this reply's field messages to `tree`.
    ///
    /// Returns `None` when the server did not reply: a cancelled or failed
    /// request has no field context, so the caller's tree is left as it is.
    #[must_use]
    pub fn enrich<S: Enrich>(&self, tree: &S, prefix: &FieldMessagePath) -> Option<S> {
        let envelope = self.envelope()?;
        let ctx = EnrichContext::new(&envelope.field_messages).with_prefix(prefix.clone());
        Some(tree.enrich(&ctx))
    }

    /// Matching [`OutcomeKind`]
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Completed(_) => OutcomeKind::Responded,
            Self::Cancelled => OutcomeKind::Cancelled,
            Self::ConnectionFailed => OutcomeKind::ConnectionFailed,
        }
    }

    /// Whether the server replied with the success status
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed(result) if result.is_success())
    }
}

/// A reply body that does not fit the versioned envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not an envelope
    #[error("malformed response envelope (status {status}): {source}")]
    MalformedEnvelope {
        /// HTTP status of the reply
        status: u16,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// Envelope is fine but `data` does not match the endpoint's type
    #[error("malformed `data` in response (status {status}): {source}")]
    MalformedData {
        /// HTTP status of the reply
        status: u16,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a [`RequestOutcome`] into an [`ApiOutcome`].
///
/// `is_success_status` decides which statuses decode `data` as `T`; all
/// others decode it as `E`. A missing or `null` `data` decodes from `null`,
/// which suits `()`, `Option<_>` and `serde_json::Value`.
///
/// # Errors
///
/// Returns [`DecodeError`] when a reply body is not a well-formed envelope.
pub fn decode_outcome<T, E>(
    outcome: &RequestOutcome,
    is_success_status: impl Fn(u16) -> bool,
) -> Result<ApiOutcome<T, E>, DecodeError>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
{
    if outcome.is_cancelled() {
        return Ok(ApiOutcome::Cancelled);
    }
    let Some(response) = outcome.response() else {
        return Ok(ApiOutcome::ConnectionFailed);
    };

    let status = response.status;
    let envelope = Envelope::<serde_json::Value>::deserialize(&response.body)
        .map_err(|source| DecodeError::MalformedEnvelope { status, source })?;
    let data = envelope.data.unwrap_or(serde_json::Value::Null);
    let messages = envelope.messages;

    let result = if is_success_status(status) {
        let data = T::deserialize(&data)
            .map_err(|source| DecodeError::MalformedData { status, source })?;
        VersionedResult::Success { data, messages }
    } else {
        let error = E::deserialize(&data)
            .map_err(|source| DecodeError::MalformedData { status, source })?;
        VersionedResult::Error { error, messages }
    };

    Ok(ApiOutcome::Completed(result))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::field_path;
    use crate::message::Severity;
    use crate::request::{Method, Request, Response};
    use serde_json::{Value, json};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Created {
        id: u64,
    }

    fn responded(status: u16, body: Value) -> RequestOutcome {
        RequestOutcome::responded(
            Request::new(Method::Post, "/v1/users"),
            Response::new(status, body),
        )
    }

    #[test]
    fn test_success_decodes_data() {
        let outcome = responded(
            201,
            json!({"success": true, "fieldMessages": [], "generalMessages": [], "data": {"id": 7}}),
        );

        let decoded: ApiOutcome<Created, Value> = decode_outcome(&outcome, |s| s == 201).unwrap();

        match decoded {
            ApiOutcome::Completed(VersionedResult::Success { data, messages }) => {
                assert_eq!(data, Created { id: 7 });
                assert!(messages.success);
            },
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_error_status_carries_field_messages() {
        let outcome = responded(
            422,
            json!({
                "success": false,
                "fieldMessages": [{
                    "path": ["username"],
                    "message": {"id": "m1", "severity": "error", "translation": {"id": "signup.taken"}}
                }],
                "generalMessages": []
            }),
        );

        let decoded: ApiOutcome<Created, ()> = decode_outcome(&outcome, |s| s == 200).unwrap();

        assert!(!decoded.is_success());
        assert_eq!(decoded.field_messages().len(), 1);
        assert_eq!(decoded.field_messages()[0].path, field_path!["username"]);
        assert_eq!(decoded.field_messages()[0].message.severity, Severity::Error);

        let tree = vec![
            crate::enrich::Field::at(String::new(), field_path!["username"]),
            crate::enrich::Field::at(String::new(), field_path!["email"]),
        ];
        let enriched = decoded.enrich(&tree, &field_path![]).unwrap();
        assert_eq!(enriched[0].messages.len(), 1);
        assert!(enriched[1].messages.is_empty());
    }

    #[test]
    fn test_status_drives_classification_not_success_flag() {
        let outcome = responded(
            200,
            json!({"success": false, "fieldMessages": [], "generalMessages": [], "data": null}),
        );

        let decoded: ApiOutcome<Option<Created>, ()> =
            decode_outcome(&outcome, |s| s == 200).unwrap();

        assert!(decoded.is_success());
        assert!(!decoded.envelope().unwrap().success);
    }

    #[test]
    fn test_cancelled_and_failed_propagate_untyped() {
        let request = Request::new(Method::Get, "/v1/users");

        let cancelled: ApiOutcome<Created, ()> =
            decode_outcome(&RequestOutcome::cancelled(request.clone()), |_| true).unwrap();
        let failed: ApiOutcome<Created, ()> =
            decode_outcome(&RequestOutcome::connection_failed(request), |_| true).unwrap();

        assert_eq!(cancelled, ApiOutcome::Cancelled);
        assert_eq!(failed, ApiOutcome::ConnectionFailed);
        assert!(failed.field_messages().is_empty());

        let tree = crate::enrich::Field::at(String::new(), field_path!["username"]);
        assert!(failed.enrich(&tree, &field_path![]).is_none());
    }

    #[test]
    fn test_missing_envelope_field_is_malformed() {
        let outcome = responded(500, json!("Internal Server Error"));
        let decoded = decode_outcome::<Value, Value>(&outcome, |s| s == 200);

        assert!(matches!(
            decoded,
            Err(DecodeError::MalformedEnvelope { status: 500, .. })
        ));
    }

    #[test]
    fn test_wrong_data_shape_is_malformed_data() {
        let outcome = responded(
            200,
            json!({"success": true, "fieldMessages": [], "generalMessages": [], "data": {"id": "x"}}),
        );
        let decoded = decode_outcome::<Created, ()>(&outcome, |s| s == 200);

        assert!(matches!(decoded, Err(DecodeError::MalformedData { .. })));
    }

    #[test]
    fn test_envelope_serializes_camel_case() {
        let envelope = Envelope {
            messages: MessageEnvelope {
                success: true,
                field_messages: vec![],
                general_messages: vec![],
            },
            data: Some(json!({"id": 1})),
        };

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": true, "fieldMessages": [], "generalMessages": [], "data": {"id": 1}})
        );
    }
}
