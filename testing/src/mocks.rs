//! In-memory stand-ins for the transport and the display layer.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned locks panic
#![allow(clippy::panic)] // FailureMode::Panic exists to exercise panic isolation

use formwire_core::envelope::MessageEnvelope;
use formwire_core::message::Message;
use formwire_core::middleware::{MessageSink, Middleware};
use formwire_core::outcome::{OutcomeKind, RequestOutcome};
use formwire_core::request::{Request, RequestId, Response};
use formwire_core::transport::{ProgressReporter, Transport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};

/// What [`MockTransport`] does with the next request.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Reply with this response
    Respond(Response),
    /// Settle without a response (lost connectivity)
    ConnectionFailure,
    /// Never settle unless cancelled
    Hang,
    /// Fail with [`TransportError::Unexpected`]
    Unexpected(String),
}

impl MockReply {
    /// Shorthand for [`MockReply::Respond`]
    #[must_use]
    pub const fn respond(status: u16, body: serde_json::Value) -> Self {
        Self::Respond(Response::new(status, body))
    }
}

#[derive(Debug)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<MockReply>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<Request>>,
    cancelled: Mutex<Vec<RequestId>>,
    in_flight: Mutex<HashMap<RequestId, oneshot::Sender<()>>>,
    arrivals: Notify,
}

/// Scripted [`Transport`] for tests.
///
/// Replies are consumed in FIFO order; once the queue is empty every request
/// gets the fallback reply (connection failure unless changed). Requests are
/// registered as in flight before anything else happens and deregistered when
/// the call settles, so tests can assert the transport never leaks handles.
///
/// # Example
///
/// ```
/// use formwire_core::request::{Method, Request};
/// use formwire_core::transport::Transport;
/// use formwire_testing::{MockReply, MockTransport};
///
/// # tokio_test::block_on(async {
/// let transport = MockTransport::new().with_fallback(MockReply::Hang);
/// let request = Request::new(Method::Get, "/slow");
/// let id = request.id();
///
/// let call = tokio::spawn({
///     let transport = transport.clone();
///     async move { transport.execute(request, None).await }
/// });
///
/// transport.wait_for_requests(1).await;
/// transport.cancel(id);
///
/// let outcome = call.await.unwrap().unwrap();
/// assert!(outcome.is_cancelled());
/// assert_eq!(transport.in_flight_count(), 0);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Create a transport with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                replies: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(MockReply::ConnectionFailure),
                delay: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
                in_flight: Mutex::new(HashMap::new()),
                arrivals: Notify::new(),
            }),
        }
    }

    /// Set the reply used once the script is exhausted
    #[must_use]
    pub fn with_fallback(self, reply: MockReply) -> Self {
        self.set_fallback(reply);
        self
    }

    /// Wait this long before producing each reply
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Queue a reply
    pub fn push_reply(&self, reply: MockReply) {
        self.state.replies.lock().unwrap().push_back(reply);
    }

    /// Change the fallback reply
    pub fn set_fallback(&self, reply: MockReply) {
        *self.state.fallback.lock().unwrap() = reply;
    }

    /// Every request received, in arrival order
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Every id passed to [`Transport::cancel`], in call order
    #[must_use]
    pub fn cancelled_ids(&self) -> Vec<RequestId> {
        self.state.cancelled.lock().unwrap().clone()
    }

    /// Requests currently executing
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.state.in_flight.lock().unwrap().len()
    }

    /// Whether `id` is currently executing
    #[must_use]
    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.state.in_flight.lock().unwrap().contains_key(&id)
    }

    /// Resolve once at least `count` requests have arrived
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let arrived = self.state.arrivals.notified();
            if self.state.requests.lock().unwrap().len() >= count {
                return;
            }
            arrived.await;
        }
    }

    fn next_reply(&self) -> MockReply {
        let scripted = self.state.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.state.fallback.lock().unwrap().clone())
    }

    async fn produce(
        &self,
        request: Request,
        reply: MockReply,
        progress: Option<&ProgressReporter>,
    ) -> Result<RequestOutcome, TransportError> {
        let delay = *self.state.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            MockReply::Respond(response) => {
                if let Some(progress) = progress {
                    progress.report(50);
                    progress.report(100);
                }
                Ok(RequestOutcome::responded(request, response))
            },
            MockReply::ConnectionFailure => Ok(RequestOutcome::connection_failed(request)),
            MockReply::Hang => std::future::pending().await,
            MockReply::Unexpected(reason) => Err(TransportError::Unexpected {
                id: request.id(),
                reason,
            }),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the in-flight entry when `execute` settles or is dropped
struct InFlightGuard<'a> {
    state: &'a MockState,
    id: RequestId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.lock().unwrap().remove(&self.id);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: Request,
        progress: Option<ProgressReporter>,
    ) -> Result<RequestOutcome, TransportError> {
        let id = request.id();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.state.in_flight.lock().unwrap().insert(id, cancel_tx);
        let _guard = InFlightGuard {
            state: &self.state,
            id,
        };

        self.state.requests.lock().unwrap().push(request.clone());
        self.state.arrivals.notify_waiters();

        let reply = self.next_reply();
        let cancelled = RequestOutcome::cancelled(request.clone());
        let outcome = tokio::select! {
            biased;
            _ = cancel_rx => Ok(cancelled),
            outcome = self.produce(request, reply, progress.as_ref()) => outcome,
        };

        if let Some(progress) = &progress {
            progress.close();
        }
        outcome
    }

    fn cancel(&self, id: RequestId) {
        self.state.cancelled.lock().unwrap().push(id);
        let sender = self.state.in_flight.lock().unwrap().remove(&id);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

/// One hook invocation seen by a [`RecordingMiddleware`].
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareEvent {
    /// `on_request` ran
    Request {
        /// Middleware label
        label: String,
        /// Request id
        id: RequestId,
    },
    /// `on_request_outcome` ran
    Outcome {
        /// Middleware label
        label: String,
        /// Request id
        id: RequestId,
        /// How the request ended
        kind: OutcomeKind,
        /// Envelope passed to the hook
        envelope: Option<MessageEnvelope>,
    },
}

impl MiddlewareEvent {
    /// Label of the middleware that recorded the event
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Request { label, .. } | Self::Outcome { label, .. } => label,
        }
    }

    /// Request the event belongs to
    #[must_use]
    pub const fn id(&self) -> RequestId {
        match self {
            Self::Request { id, .. } | Self::Outcome { id, .. } => *id,
        }
    }
}

/// Shared, ordered log of middleware events.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<MiddlewareEvent>>>);

impl EventLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in recording order
    #[must_use]
    pub fn events(&self) -> Vec<MiddlewareEvent> {
        self.0.lock().unwrap().clone()
    }

    /// Events for one request
    #[must_use]
    pub fn events_for(&self, id: RequestId) -> Vec<MiddlewareEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.id() == id)
            .collect()
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }

    fn push(&self, event: MiddlewareEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// How a [`RecordingMiddleware`] misbehaves after recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return an error from every hook
    Error,
    /// Panic in every hook
    Panic,
}

/// Middleware that records every hook call into an [`EventLog`].
#[derive(Debug, Clone)]
pub struct RecordingMiddleware {
    label: String,
    log: EventLog,
    failure: Option<FailureMode>,
}

impl RecordingMiddleware {
    /// Record into `log` under `label`
    #[must_use]
    pub fn new(label: impl Into<String>, log: EventLog) -> Self {
        Self {
            label: label.into(),
            log,
            failure: None,
        }
    }

    /// Fail in every hook after recording
    #[must_use]
    pub const fn failing(mut self, mode: FailureMode) -> Self {
        self.failure = Some(mode);
        self
    }

    fn misbehave(&self, hook: &str) -> anyhow::Result<()> {
        match self.failure {
            None => Ok(()),
            Some(FailureMode::Error) => Err(anyhow::anyhow!("{} failed in {hook}", self.label)),
            Some(FailureMode::Panic) => panic!("{} panicked in {hook}", self.label),
        }
    }
}

impl Middleware for RecordingMiddleware {
    fn on_request(&self, request: &Request) -> anyhow::Result<()> {
        self.log.push(MiddlewareEvent::Request {
            label: self.label.clone(),
            id: request.id(),
        });
        self.misbehave("on_request")
    }

    fn on_request_outcome(
        &self,
        outcome: &RequestOutcome,
        envelope: Option<&MessageEnvelope>,
    ) -> anyhow::Result<()> {
        self.log.push(MiddlewareEvent::Outcome {
            label: self.label.clone(),
            id: outcome.request().id(),
            kind: outcome.kind(),
            envelope: envelope.cloned(),
        });
        self.misbehave("on_request_outcome")
    }
}

/// [`MessageSink`] that keeps every message it is shown.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink(Arc<Mutex<Vec<Message>>>);

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages shown so far
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.0.lock().unwrap().clone()
    }

    /// Number of messages shown
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Whether nothing was shown
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

impl MessageSink for RecordingSink {
    fn show(&self, message: &Message) {
        self.0.lock().unwrap().push(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwire_core::request::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_replies_then_fallback() {
        let transport = MockTransport::new();
        transport.push_reply(MockReply::respond(201, json!({})));

        let first = transport
            .execute(Request::new(Method::Post, "/a"), None)
            .await
            .unwrap();
        let second = transport
            .execute(Request::new(Method::Post, "/a"), None)
            .await
            .unwrap();

        assert_eq!(first.kind(), OutcomeKind::Responded);
        assert_eq!(second.kind(), OutcomeKind::ConnectionFailed);
        assert_eq!(transport.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_err() {
        let transport = MockTransport::new().with_fallback(MockReply::Unexpected("boom".into()));
        let request = Request::new(Method::Get, "/a");
        let id = request.id();

        let err = transport.execute(request, None).await.unwrap_err();

        assert_eq!(err.request_id(), id);
        assert!(!transport.is_in_flight(id));
    }

    #[tokio::test]
    async fn test_progress_closed_after_settle() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |pct| sink.lock().unwrap().push(pct));
        let transport = MockTransport::new();
        transport.push_reply(MockReply::respond(200, json!(null)));

        transport
            .execute(Request::new(Method::Get, "/a"), Some(reporter.clone()))
            .await
            .unwrap();
        reporter.report(100);

        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }

    #[test]
    fn test_cancel_unknown_id_is_recorded_noop() {
        let transport = MockTransport::new();
        let id = RequestId::new();
        transport.cancel(id);
        assert_eq!(transport.cancelled_ids(), vec![id]);
        assert_eq!(transport.in_flight_count(), 0);
    }
}
