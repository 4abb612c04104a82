//! Terminal outcome of executing one [`Request`].

use crate::request::{Request, Response};
use std::fmt;

/// Which of the three mutually exclusive terminal states a request reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// The server replied (any status)
    Responded,
    /// The request was cancelled before a reply was used
    Cancelled,
    /// No reply was received and nobody cancelled (connectivity loss, timeout)
    ConnectionFailed,
}

impl OutcomeKind {
    /// Stable name, used as a metrics label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Responded => "responded",
            Self::Cancelled => "cancelled",
            Self::ConnectionFailed => "connection_failed",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request paired with its reply, cancellation, or connectivity failure.
///
/// The constructors guarantee that a cancelled outcome never carries a
/// response, so [`kind`](Self::kind) is always unambiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    request: Request,
    response: Option<Response>,
    cancelled: bool,
}

impl RequestOutcome {
    /// The server replied
    #[must_use]
    pub const fn responded(request: Request, response: Response) -> Self {
        Self {
            request,
            response: Some(response),
            cancelled: false,
        }
    }

    /// The request was cancelled
    #[must_use]
    pub const fn cancelled(request: Request) -> Self {
        Self {
            request,
            response: None,
            cancelled: true,
        }
    }

    /// No reply arrived
    #[must_use]
    pub const fn connection_failed(request: Request) -> Self {
        Self {
            request,
            response: None,
            cancelled: false,
        }
    }

    /// The request as the caller built it
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// The server reply, present only for [`OutcomeKind::Responded`]
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Whether the request was cancelled
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Classify the outcome
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match (&self.response, self.cancelled) {
            (_, true) => OutcomeKind::Cancelled,
            (Some(_), false) => OutcomeKind::Responded,
            (None, false) => OutcomeKind::ConnectionFailed,
        }
    }

    /// Split into request and optional response
    #[must_use]
    pub fn into_parts(self) -> (Request, Option<Response>) {
        (self.request, self.response)
    }
}
