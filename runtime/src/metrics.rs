//! Metric names and descriptions.
//!
//! Metrics are emitted through the `metrics` facade. Nothing is recorded
//! anywhere until the application installs a recorder (for example a
//! Prometheus exporter); call [`describe_metrics`] once after installing it
//! to attach descriptions.
//!
//! | Name | Kind | Labels |
//! |------|------|--------|
//! | `formwire.requests.started` | counter | `scope` |
//! | `formwire.requests.settled` | counter | `kind` |
//! | `formwire.requests.cancelled` | counter | |
//! | `formwire.middleware.failures` | counter | `hook` |
//! | `formwire.endpoint.decode_failures` | counter | |
//! | `formwire.transport.errors` | counter | |
//! | `formwire.transport.duration_seconds` | histogram | `kind` |

use metrics::{describe_counter, describe_histogram};

/// Requests handed to a scope
pub const REQUESTS_STARTED: &str = "formwire.requests.started";
/// Requests that reached a terminal outcome
pub const REQUESTS_SETTLED: &str = "formwire.requests.settled";
/// Cancellations forwarded to the transport
pub const REQUESTS_CANCELLED: &str = "formwire.requests.cancelled";
/// Middleware hooks that returned an error or panicked
pub const MIDDLEWARE_FAILURES: &str = "formwire.middleware.failures";
/// Replies that did not fit the envelope
pub const DECODE_FAILURES: &str = "formwire.endpoint.decode_failures";
/// Unexpected transport failures
pub const TRANSPORT_ERRORS: &str = "formwire.transport.errors";
/// Wall time of one HTTP exchange
pub const TRANSPORT_DURATION: &str = "formwire.transport.duration_seconds";

/// Register descriptions for every Formwire metric.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_STARTED, "Requests started through a request scope");
    describe_counter!(
        REQUESTS_SETTLED,
        "Requests that settled, labelled by outcome kind"
    );
    describe_counter!(
        REQUESTS_CANCELLED,
        "Cancellations forwarded from a scope to its transport"
    );
    describe_counter!(
        MIDDLEWARE_FAILURES,
        "Middleware hooks that returned an error or panicked"
    );
    describe_counter!(
        DECODE_FAILURES,
        "Responses whose body did not match the versioned envelope"
    );
    describe_counter!(
        TRANSPORT_ERRORS,
        "Transport calls that failed for reasons other than network conditions"
    );
    describe_histogram!(
        TRANSPORT_DURATION,
        metrics::Unit::Seconds,
        "Time from sending a request to settling it"
    );
}
