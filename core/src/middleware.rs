//! Observers of the request lifecycle.
//!
//! A [`Middleware`] sees every request a scope starts and every outcome it
//! settles. Hooks run in registration order. Middleware cannot change a
//! request or its outcome; a failing hook is reported and skipped.

use crate::envelope::MessageEnvelope;
use crate::message::Message;
use crate::outcome::RequestOutcome;
use crate::request::Request;

/// Request lifecycle observer.
///
/// # Example
///
/// ```
/// use formwire_core::middleware::Middleware;
/// use formwire_core::request::Request;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountRequests(AtomicUsize);
///
/// impl Middleware for CountRequests {
///     fn on_request(&self, _request: &Request) -> anyhow::Result<()> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Name used in logs when a hook fails
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Called after the request is registered as pending, before it is sent
    ///
    /// # Errors
    ///
    /// An error is logged and counted; it never affects the request.
    fn on_request(&self, request: &Request) -> anyhow::Result<()> {
        let _ = request;
        Ok(())
    }

    /// Called after the request left the pending set.
    ///
    /// `envelope` is present when the server replied with a well-formed
    /// versioned envelope.
    ///
    /// # Errors
    ///
    /// An error is logged and counted; it never affects the outcome.
    fn on_request_outcome(
        &self,
        outcome: &RequestOutcome,
        envelope: Option<&MessageEnvelope>,
    ) -> anyhow::Result<()> {
        let _ = (outcome, envelope);
        Ok(())
    }
}

/// Where general messages are shown to the user.
pub trait MessageSink: Send + Sync {
    /// Present one message
    fn show(&self, message: &Message);
}

impl<F> MessageSink for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn show(&self, message: &Message) {
        self(message);
    }
}
