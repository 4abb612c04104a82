//! # Formwire Core
//!
//! Types and traits for talking to versioned JSON endpoints from an
//! interactive client, and for routing the server's field messages back onto
//! the client's state tree.
//!
//! ## Core Concepts
//!
//! - **Request / Response**: immutable values; a [`RequestId`] is the only
//!   cancellation handle
//! - **Outcome**: a request ends responded, cancelled, or without a reply
//!   ([`RequestOutcome`], [`OutcomeKind`])
//! - **Endpoint**: typed payload in, typed [`ApiOutcome`] out, one impl per
//!   server operation ([`Endpoint`], [`JsonEndpoint`])
//! - **Transport**: executes requests and cancels them by id ([`Transport`])
//! - **Middleware**: observers of every request and outcome ([`Middleware`])
//! - **Enrichment**: a pure rebuild of a state tree with field messages
//!   attached to matching leaves ([`enrich::enrich`])
//!
//! Orchestration (`RequestScope`) and the HTTP transport live in
//! `formwire-runtime`.
//!
//! ## Example
//!
//! ```
//! use formwire_core::enrich::{Enrich, EnrichContext, Field};
//! use formwire_core::envelope::{ApiOutcome, decode_outcome};
//! use formwire_core::field_path;
//! use formwire_core::outcome::RequestOutcome;
//! use formwire_core::request::{Method, Request, Response};
//! use serde_json::json;
//!
//! let request = Request::new(Method::Post, "/v1/signup");
//! let outcome = RequestOutcome::responded(
//!     request,
//!     Response::new(422, json!({
//!         "success": false,
//!         "fieldMessages": [{
//!             "path": ["username"],
//!             "message": {"id": "m1", "severity": "error", "translation": {"id": "signup.taken"}}
//!         }],
//!         "generalMessages": []
//!     })),
//! );
//!
//! let result: ApiOutcome<(), ()> = decode_outcome(&outcome, |status| status == 201).unwrap();
//!
//! let username = Field::at(String::from("ada"), field_path!["username"]);
//! let username = username.enrich(&EnrichContext::new(result.field_messages()));
//!
//! assert_eq!(username.messages.len(), 1);
//! ```

pub use async_trait::async_trait;

/// Display messages, field paths and field messages
pub mod message;

/// `field_path!` macro
pub mod path_macros;

/// Requests, responses and request ids
pub mod request;

/// Terminal request outcomes
pub mod outcome;

/// The versioned wire envelope
pub mod envelope;

/// Endpoint definitions
pub mod endpoint;

/// Transport contract and progress reporting
pub mod transport;

/// Middleware and message sinks
pub mod middleware;

/// Field-message enrichment of state trees
pub mod enrich;

pub use endpoint::{Endpoint, EndpointError, JsonEndpoint, PathTemplate};
pub use enrich::{Enrich, EnrichContext, Field, Scoped};
pub use envelope::{ApiOutcome, DecodeError, Envelope, MessageEnvelope, VersionedResult};
pub use message::{FieldMessage, FieldMessagePath, Message, PathSegment, Severity, Translation};
pub use middleware::{MessageSink, Middleware};
pub use outcome::{OutcomeKind, RequestOutcome};
pub use request::{Headers, Method, QueryValue, Request, RequestId, Response};
pub use transport::{ProgressReporter, Transport, TransportError};
