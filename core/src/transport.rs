//! The transport contract: execute one [`Request`], cancel by id.
//!
//! A transport resolves every ordinary network condition to a
//! [`RequestOutcome`]: HTTP error statuses are responses, an aborted request
//! is a cancelled outcome, and lost connectivity is an outcome without a
//! response. `Err` is reserved for unexpected failures that indicate a bug or
//! a misconfigured client.
//!
//! # Implementations
//!
//! - `HttpTransport` in `formwire-runtime` (reqwest)
//! - `MockTransport` in `formwire-testing`

use crate::outcome::RequestOutcome;
use crate::request::{Request, RequestId};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Progress callback. Receives a percentage in `[0, 100]`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Default)]
struct ProgressState {
    last: Option<u8>,
    closed: bool,
}

/// Guards a caller's progress callback.
///
/// Values are clamped to 100, values below the last reported one are
/// dropped, and nothing is delivered after [`close`](Self::close). Clones
/// share state, so a transport can hand a clone to a background reader and
/// close the original when the request settles.
///
/// The callback runs without any lock held and may call back into the
/// reporter. Ordering is only guaranteed between reports made from one task.
///
/// # Example
///
/// ```
/// use formwire_core::transport::ProgressReporter;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let reporter = ProgressReporter::new(move |pct| sink.lock().unwrap().push(pct));
///
/// reporter.report(10);
/// reporter.report(5);
/// reporter.report(250);
/// reporter.close();
/// reporter.report(100);
///
/// assert_eq!(*seen.lock().unwrap(), vec![10, 100]);
/// ```
#[derive(Clone)]
pub struct ProgressReporter {
    state: Arc<Mutex<ProgressState>>,
    callback: ProgressFn,
}

impl ProgressReporter {
    /// Wrap a callback
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgressState::default())),
            callback: Arc::new(callback),
        }
    }

    /// Deliver a percentage if it keeps the sequence non-decreasing
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.closed || state.last.is_some_and(|last| percent <= last) {
                return;
            }
            state.last = Some(percent);
        }
        (self.callback)(percent);
    }

    /// Stop delivering progress. Idempotent.
    pub fn close(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed = true;
    }

    /// Last delivered percentage
    #[must_use]
    pub fn last(&self) -> Option<u8> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
    }

    /// Whole percentage of `done` out of `total`, `None` when `total` is zero
    #[must_use]
    pub fn percent_of(done: u64, total: u64) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let percent = done.min(total).saturating_mul(100) / total;
        u8::try_from(percent).ok()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last", &self.last())
            .finish_non_exhaustive()
    }
}

/// Unexpected transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be turned into a wire request
    #[error("request {id} is invalid: {reason}")]
    InvalidRequest {
        /// Request id
        id: RequestId,
        /// What was wrong
        reason: String,
    },

    /// Any other failure that is not a network condition
    #[error("unexpected failure executing request {id}: {reason}")]
    Unexpected {
        /// Request id
        id: RequestId,
        /// Underlying error
        reason: String,
    },
}

impl TransportError {
    /// Id of the failed request
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::InvalidRequest { id, .. }
            | Self::Unexpected { id, .. } => *id,
        }
    }
}

/// Executes requests. Must be safe to share between scopes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request.
    ///
    /// The request id is registered before any I/O starts and deregistered
    /// exactly once when the returned future settles. `progress`, when given,
    /// is closed before the future settles.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only for unexpected failures. HTTP error
    /// statuses, cancellation and connectivity loss are `Ok` outcomes.
    async fn execute(
        &self,
        request: Request,
        progress: Option<ProgressReporter>,
    ) -> Result<RequestOutcome, TransportError>;

    /// Ask an in-flight request to abort. Unknown or settled ids are ignored.
    fn cancel(&self, id: RequestId);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(
        &self,
        request: Request,
        progress: Option<ProgressReporter>,
    ) -> Result<RequestOutcome, TransportError> {
        (**self).execute(request, progress).await
    }

    fn cancel(&self, id: RequestId) {
        (**self).cancel(id);
    }
}
