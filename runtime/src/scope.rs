//! Scoped request orchestration.
//!
//! A [`RequestScope`] tracks the requests one logical unit of UI (a view, a
//! form) has started, so they can be cancelled individually or all at once
//! when the unit goes away. It runs its middleware around every request and
//! decodes replies through the request's [`Endpoint`].
//!
//! # Request lifecycle
//!
//! 1. The payload is encoded. An encoding error registers nothing.
//! 2. The id joins the pending set and every `on_request` hook runs.
//! 3. When the returned [`InFlight`] is first polled, the request is handed
//!    to the transport.
//! 4. On settlement the id leaves the pending set, the reply is decoded and
//!    every `on_request_outcome` hook runs before the caller sees the result.
//!
//! The pending entry is owned by a guard inside the request future, so the
//! id is released even when the future is dropped or a hook panics.
//!
//! # Example
//!
//! ```
//! use formwire_core::endpoint::JsonEndpoint;
//! use formwire_core::request::Method;
//! use formwire_runtime::scope::RequestScope;
//! use formwire_testing::{MockReply, MockTransport, success_body};
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.push_reply(MockReply::respond(200, success_body(json!({"ok": true}))));
//!
//! let scope = RequestScope::new(Arc::new(transport)).with_name("profile");
//! let endpoint: JsonEndpoint<Value, Value> = JsonEndpoint::new(Method::Get, "/v1/profile");
//!
//! let settled = scope.execute(&endpoint, Value::Null).unwrap().await.unwrap();
//! assert!(settled.result.is_success());
//! assert_eq!(scope.pending_count(), 0);
//! # });
//! ```

use crate::metrics::{
    DECODE_FAILURES, MIDDLEWARE_FAILURES, REQUESTS_CANCELLED, REQUESTS_SETTLED, REQUESTS_STARTED,
};
use formwire_core::endpoint::{Endpoint, EndpointError};
use formwire_core::envelope::{ApiOutcome, MessageEnvelope};
use formwire_core::middleware::Middleware;
use formwire_core::outcome::RequestOutcome;
use formwire_core::request::{Request, RequestId};
use formwire_core::transport::{ProgressReporter, Transport, TransportError};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::Instrument;

type Pending = Arc<Mutex<HashMap<RequestId, oneshot::Sender<()>>>>;
type MiddlewareList = Arc<RwLock<Vec<Arc<dyn Middleware>>>>;

/// Errors from [`RequestScope::execute`].
///
/// Neither variant covers an expected condition: cancellation, connectivity
/// loss and error statuses are all delivered as [`Settled`] values.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The payload could not be encoded or the reply could not be decoded
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// The transport failed abnormally
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A settled request.
#[derive(Debug, Clone)]
pub struct Settled<T, E> {
    /// Raw outcome, including the request that was sent
    pub outcome: RequestOutcome,
    /// Typed result
    pub result: ApiOutcome<T, E>,
}

impl<T, E> Settled<T, E> {
    /// Whether the request was cancelled
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.outcome.is_cancelled()
    }
}

/// Future of a request started with [`RequestScope::execute`].
///
/// The request is registered as pending as soon as it is created, but is
/// only sent once polled.
#[must_use = "the request is not sent until the future is awaited"]
pub struct InFlight<T, E> {
    id: RequestId,
    future: BoxFuture<'static, Result<Settled<T, E>, ScopeError>>,
}

impl<T, E> InFlight<T, E> {
    /// Id to pass to [`RequestScope::cancel_request_by_id`]
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }
}

impl<T, E> Future for InFlight<T, E> {
    type Output = Result<Settled<T, E>, ScopeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T, E> std::fmt::Debug for InFlight<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Orchestrates requests for one scope.
pub struct RequestScope {
    name: String,
    transport: Arc<dyn Transport>,
    pending: Pending,
    middleware: MiddlewareList,
}

impl RequestScope {
    /// Create a root scope over `transport`
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::named("root", transport)
    }

    /// Create a named scope over `transport`
    #[must_use]
    pub fn named(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            middleware: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Rename this scope
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A new scope sharing this scope's transport.
    ///
    /// The child starts with no pending requests and no middleware.
    /// Cancelling or dropping either scope never touches the other's
    /// requests.
    #[must_use]
    pub fn scoped(&self, name: impl Into<String>) -> Self {
        Self::named(name, Arc::clone(&self.transport))
    }

    /// Scope name, used in spans and metric labels
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a middleware
    #[must_use]
    pub fn with_middleware(self, middleware: impl Middleware + 'static) -> Self {
        self.add_middleware(Arc::new(middleware));
        self
    }

    /// Append a shared middleware.
    ///
    /// Requests already started keep the middleware list they started with.
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(middleware);
    }

    /// Number of registered middleware
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start a request through `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Endpoint`] immediately when the payload cannot
    /// be encoded. The returned future fails with [`ScopeError`] when the
    /// reply does not decode or the transport fails abnormally.
    pub fn execute<E>(
        &self,
        endpoint: &E,
        payload: E::Payload,
    ) -> Result<InFlight<E::Data, E::ErrorData>, ScopeError>
    where
        E: Endpoint + Clone + 'static,
    {
        self.start(endpoint, payload, None)
    }

    /// Like [`execute`](Self::execute), reporting download progress to `progress`
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub fn execute_with_progress<E>(
        &self,
        endpoint: &E,
        payload: E::Payload,
        progress: ProgressReporter,
    ) -> Result<InFlight<E::Data, E::ErrorData>, ScopeError>
    where
        E: Endpoint + Clone + 'static,
    {
        self.start(endpoint, payload, Some(progress))
    }

    fn start<E>(
        &self,
        endpoint: &E,
        payload: E::Payload,
        progress: Option<ProgressReporter>,
    ) -> Result<InFlight<E::Data, E::ErrorData>, ScopeError>
    where
        E: Endpoint + Clone + 'static,
    {
        let request = endpoint.encode(payload)?;
        let id = request.id();

        let (guard, cancelled) = self.register(id);
        metrics::counter!(REQUESTS_STARTED, "scope" => self.name.clone()).increment(1);

        let middleware = self
            .middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        run_request_hooks(&middleware, &request);

        let span = tracing::debug_span!(
            "scoped_request",
            scope = %self.name,
            request_id = %id,
            method = %request.method(),
            url = %request.url(),
        );
        let transport = Arc::clone(&self.transport);
        let endpoint = endpoint.clone();

        let future = async move {
            let settled = tokio::select! {
                biased;
                _ = cancelled => Ok(RequestOutcome::cancelled(request.clone())),
                result = transport.execute(request.clone(), progress.clone()) => result,
            };

            if let Some(progress) = &progress {
                progress.close();
            }
            drop(guard);

            let outcome = match settled {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "Transport failed");
                    return Err(ScopeError::Transport(err));
                },
            };
            metrics::counter!(REQUESTS_SETTLED, "kind" => outcome.kind().as_str()).increment(1);
            tracing::debug!(kind = %outcome.kind(), "Request settled");

            match endpoint.decode(&outcome) {
                Ok(result) => {
                    run_outcome_hooks(&middleware, &outcome, result.envelope());
                    Ok(Settled { outcome, result })
                },
                Err(err) => {
                    tracing::error!(error = %err, "Failed to decode response");
                    metrics::counter!(DECODE_FAILURES).increment(1);
                    run_outcome_hooks(&middleware, &outcome, None);
                    Err(ScopeError::Endpoint(err))
                },
            }
        }
        .instrument(span)
        .boxed();

        Ok(InFlight { id, future })
    }

    fn register(&self, id: RequestId) -> (PendingGuard, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, cancel_tx);
        tracing::debug!(scope = %self.name, request_id = %id, "Request pending");

        (
            PendingGuard {
                pending: Arc::clone(&self.pending),
                id,
            },
            cancel_rx,
        )
    }

    /// Cancel one request started by this scope.
    ///
    /// Returns `false`, without reaching the transport, when `id` is not
    /// pending here. After a `true` return the id is no longer pending and
    /// the request's future settles as cancelled.
    pub fn cancel_request_by_id(&self, id: RequestId) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        let Some(sender) = sender else {
            tracing::debug!(scope = %self.name, request_id = %id, "Cancel ignored, not pending");
            return false;
        };

        let _ = sender.send(());
        self.transport.cancel(id);
        metrics::counter!(REQUESTS_CANCELLED).increment(1);
        tracing::debug!(scope = %self.name, request_id = %id, "Request cancelled");
        true
    }

    /// Cancel every pending request; returns how many were cancelled
    pub fn cancel_all_requests(&self) -> usize {
        self.pending_ids()
            .into_iter()
            .filter(|id| self.cancel_request_by_id(*id))
            .count()
    }

    /// Ids of the pending requests
    #[must_use]
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Number of pending requests
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether `id` is pending in this scope
    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let cancelled = self.cancel_all_requests();
        if cancelled > 0 {
            tracing::debug!(scope = %self.name, cancelled, "Scope dropped with pending requests");
        }
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("name", &self.name)
            .field("pending", &self.pending_count())
            .field("middleware", &self.middleware_count())
            .finish_non_exhaustive()
    }
}

/// Releases a pending id on drop
struct PendingGuard {
    pending: Pending,
    id: RequestId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

fn run_request_hooks(middleware: &[Arc<dyn Middleware>], request: &Request) {
    for hook in middleware {
        let result = catch_unwind(AssertUnwindSafe(|| hook.on_request(request)));
        report_hook_failure(hook.name(), "on_request", result);
    }
}

fn run_outcome_hooks(
    middleware: &[Arc<dyn Middleware>],
    outcome: &RequestOutcome,
    envelope: Option<&MessageEnvelope>,
) {
    for hook in middleware {
        let result = catch_unwind(AssertUnwindSafe(|| {
            hook.on_request_outcome(outcome, envelope)
        }));
        report_hook_failure(hook.name(), "on_request_outcome", result);
    }
}

fn report_hook_failure(
    middleware: &'static str,
    hook: &'static str,
    result: std::thread::Result<anyhow::Result<()>>,
) {
    let reason = match result {
        Ok(Ok(())) => return,
        Ok(Err(err)) => format!("{err:#}"),
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|message| (*message).to_owned())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .map_or_else(|| "panicked".to_owned(), |message| format!("panicked: {message}")),
    };

    tracing::error!(middleware, hook, reason = %reason, "Middleware hook failed");
    metrics::counter!(MIDDLEWARE_FAILURES, "hook" => hook).increment(1);
}
