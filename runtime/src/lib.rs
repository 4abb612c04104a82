//! # Formwire Runtime
//!
//! Runtime pieces for talking to a versioned API.
//!
//! ## Core Components
//!
//! - **[`HttpTransport`]**: sends requests with `reqwest`, cancellable by id
//! - **[`RequestScope`]**: tracks the requests of one view, runs middleware,
//!   decodes replies and cancels everything when dropped
//! - **Built-in middleware**: logging, general-message display and
//!   connection-failure notices
//! - **[`TransportConfig`]**: base URL, headers, token and limits, from code
//!   or from `FORMWIRE_*` environment variables
//!
//! ## Example
//!
//! ```no_run
//! use formwire_core::endpoint::JsonEndpoint;
//! use formwire_core::message::Message;
//! use formwire_core::request::Method;
//! use formwire_runtime::{
//!     ConnectionFailureMiddleware, GeneralMessagesMiddleware, HttpTransport, RequestScope,
//!     TracingMiddleware,
//! };
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::from_env()?);
//! let sink = Arc::new(|message: &Message| eprintln!("{}", message.translation.id));
//!
//! let scope = RequestScope::named("signup", transport)
//!     .with_middleware(TracingMiddleware)
//!     .with_middleware(GeneralMessagesMiddleware::new(sink.clone()))
//!     .with_middleware(ConnectionFailureMiddleware::new(sink));
//!
//! let endpoint: JsonEndpoint<Value, Value> =
//!     JsonEndpoint::new(Method::Post, "/v1/signup").with_success_status(201);
//! let settled = scope.execute(&endpoint, json!({"username": "ada"}))?.await?;
//!
//! println!("{:?}", settled.result.field_messages());
//! # Ok(())
//! # }
//! ```

/// Transport configuration
pub mod config;

/// HTTP transport over `reqwest`
pub mod http;

/// Scoped request orchestration
pub mod scope;

/// Built-in middleware
pub mod middleware;

/// Metric names
pub mod metrics;

pub use config::{ConfigError, TransportConfig};
pub use http::HttpTransport;
pub use middleware::{ConnectionFailureMiddleware, GeneralMessagesMiddleware, TracingMiddleware};
pub use scope::{InFlight, RequestScope, ScopeError, Settled};
