//! # Formwire Testing
//!
//! Testing utilities for code built on Formwire.
//!
//! This crate provides:
//! - [`MockTransport`]: scripted replies, hanging requests, cancellation tracking
//! - [`RecordingMiddleware`] and [`RecordingSink`]: observe what a scope did
//! - Envelope body builders in [`helpers`]
//! - proptest strategies for paths, messages and JSON state trees in [`properties`]
//!
//! ## Example
//!
//! ```
//! use formwire_core::request::{Method, Request};
//! use formwire_core::transport::Transport;
//! use formwire_testing::helpers::success_body;
//! use formwire_testing::{MockReply, MockTransport};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.push_reply(MockReply::respond(200, success_body(json!({"id": 1}))));
//!
//! let outcome = transport
//!     .execute(Request::new(Method::Get, "/v1/users/1"), None)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(outcome.response().map(|r| r.status), Some(200));
//! assert_eq!(transport.requests().len(), 1);
//! # });
//! ```

/// Mock implementations of the transport and middleware traits
pub mod mocks;

/// Response body and message builders
pub mod helpers;

/// Property-based testing strategies
pub mod properties;

// Re-export commonly used items
pub use helpers::{error_body, field_message, message, success_body};
pub use mocks::{
    EventLog, FailureMode, MiddlewareEvent, MockReply, MockTransport, RecordingMiddleware,
    RecordingSink,
};
