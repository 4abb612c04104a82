//! Built-in middleware.
//!
//! - [`TracingMiddleware`] logs every request and outcome
//! - [`GeneralMessagesMiddleware`] forwards `generalMessages` to a [`MessageSink`]
//! - [`ConnectionFailureMiddleware`] shows one message per lost connection
//!
//! # Example
//!
//! ```
//! use formwire_core::message::Message;
//! use formwire_runtime::middleware::{
//!     ConnectionFailureMiddleware, GeneralMessagesMiddleware, TracingMiddleware,
//! };
//! use formwire_runtime::scope::RequestScope;
//! use formwire_testing::MockTransport;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(|message: &Message| println!("{}", message.translation.id));
//!
//! let scope = RequestScope::new(Arc::new(MockTransport::new()))
//!     .with_middleware(TracingMiddleware)
//!     .with_middleware(GeneralMessagesMiddleware::new(sink.clone()))
//!     .with_middleware(ConnectionFailureMiddleware::new(sink));
//!
//! assert_eq!(scope.middleware_count(), 3);
//! ```

use formwire_core::envelope::MessageEnvelope;
use formwire_core::message::{Message, Severity};
use formwire_core::middleware::{MessageSink, Middleware};
use formwire_core::outcome::{OutcomeKind, RequestOutcome};
use formwire_core::request::Request;
use std::sync::Arc;

/// Logs requests at `info` and lost connections at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn on_request(&self, request: &Request) -> anyhow::Result<()> {
        tracing::info!(
            request_id = %request.id(),
            method = %request.method(),
            url = %request.url(),
            "Request started"
        );
        Ok(())
    }

    fn on_request_outcome(
        &self,
        outcome: &RequestOutcome,
        envelope: Option<&MessageEnvelope>,
    ) -> anyhow::Result<()> {
        let request = outcome.request();
        match outcome.response() {
            Some(response) => tracing::info!(
                request_id = %request.id(),
                status = response.status,
                success = envelope.map(|envelope| envelope.success),
                field_messages = envelope.map_or(0, |envelope| envelope.field_messages.len()),
                "Request completed"
            ),
            None if outcome.is_cancelled() => {
                tracing::info!(request_id = %request.id(), "Request cancelled");
            },
            None => tracing::warn!(
                request_id = %request.id(),
                url = %request.url(),
                "Request failed: no response received"
            ),
        }
        Ok(())
    }
}

/// Shows every general message of a reply.
pub struct GeneralMessagesMiddleware {
    sink: Arc<dyn MessageSink>,
}

impl GeneralMessagesMiddleware {
    /// Forward to `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }
}

impl Middleware for GeneralMessagesMiddleware {
    fn name(&self) -> &'static str {
        "general_messages"
    }

    fn on_request_outcome(
        &self,
        _outcome: &RequestOutcome,
        envelope: Option<&MessageEnvelope>,
    ) -> anyhow::Result<()> {
        for message in envelope.map_or(&[][..], |envelope| &envelope.general_messages) {
            self.sink.show(message);
        }
        Ok(())
    }
}

impl std::fmt::Debug for GeneralMessagesMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralMessagesMiddleware").finish_non_exhaustive()
    }
}

/// Shows exactly one message for each request that got no reply.
///
/// Cancelled requests are not failures and show nothing.
pub struct ConnectionFailureMiddleware {
    sink: Arc<dyn MessageSink>,
    message: Message,
}

impl ConnectionFailureMiddleware {
    /// Id of the default message
    pub const MESSAGE_ID: &'static str = "connection-failed";
    /// Translation id of the default message
    pub const TRANSLATION_ID: &'static str = "error.connectionFailed";

    /// Show the default message on `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink,
            message: Message::new(Self::MESSAGE_ID, Severity::Error, Self::TRANSLATION_ID),
        }
    }

    /// Replace the message shown
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = message;
        self
    }
}

impl Middleware for ConnectionFailureMiddleware {
    fn name(&self) -> &'static str {
        "connection_failure"
    }

    fn on_request_outcome(
        &self,
        outcome: &RequestOutcome,
        _envelope: Option<&MessageEnvelope>,
    ) -> anyhow::Result<()> {
        if outcome.kind() == OutcomeKind::ConnectionFailed {
            self.sink.show(&self.message);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionFailureMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFailureMiddleware")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
