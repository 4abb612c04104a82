//! [`Transport`] over HTTP using `reqwest`.

use crate::config::{ConfigError, TransportConfig};
use crate::metrics::{TRANSPORT_DURATION, TRANSPORT_ERRORS};
use formwire_core::outcome::RequestOutcome;
use formwire_core::request::{Headers, Method, Request, RequestId, Response};
use formwire_core::transport::{ProgressReporter, Transport, TransportError};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::oneshot;

type Registry = Arc<Mutex<HashMap<RequestId, oneshot::Sender<()>>>>;

/// HTTP transport.
///
/// Cheap to clone; clones share the client and the in-flight registry, so a
/// request started through one clone can be cancelled through another.
///
/// Network conditions never produce `Err`: an unreachable host, a timeout or
/// a connection dropped mid-body all yield a connection-failed outcome.
///
/// # Example
///
/// ```no_run
/// use formwire_core::request::{Method, Request};
/// use formwire_core::transport::Transport;
/// use formwire_runtime::config::TransportConfig;
/// use formwire_runtime::http::HttpTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new(
///     TransportConfig::default().with_base_url("https://api.example.com"),
/// )?;
///
/// let outcome = transport
///     .execute(Request::new(Method::Get, "/v1/health"), None)
///     .await?;
/// println!("{:?}", outcome.kind());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: Arc<TransportConfig>,
    in_flight: Registry,
}

impl HttpTransport {
    /// Build a transport from `config`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if the HTTP client cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Build a transport from the `FORMWIRE_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unparsable variables or an unbuildable client.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(TransportConfig::from_env()?)
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Requests currently executing
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn register(&self, id: RequestId) -> (Registration, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, cancel_tx);
        tracing::debug!(request_id = %id, "Registered request");

        (
            Registration {
                in_flight: Arc::clone(&self.in_flight),
                id,
            },
            cancel_rx,
        )
    }

    /// Headers in precedence order: defaults, configured token, request
    fn merged_headers(&self, request: &Request) -> Headers {
        let mut headers = self.config.default_headers.clone();
        if let Some(token) = &self.config.bearer_token {
            headers.insert("authorization".to_owned(), format!("Bearer {token}"));
        }
        headers.extend(
            request
                .headers()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        headers
    }

    /// Send `request`. `Ok(None)` means no usable reply was received, which
    /// includes a body over the size limit.
    async fn perform(
        &self,
        request: &Request,
        progress: Option<&ProgressReporter>,
    ) -> Result<Option<Response>, TransportError> {
        let id = request.id();
        let url = self.config.resolve_url(request.url());

        let mut builder = self.client.request(to_reqwest_method(request.method()), &url);
        for (name, value) in self.merged_headers(request) {
            builder = builder.header(name, value);
        }
        if !request.query().is_empty() {
            let pairs: Vec<(&str, String)> = request
                .query()
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_string()))
                .collect();
            builder = builder.query(&pairs);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) if err.is_builder() => {
                return Err(TransportError::InvalidRequest {
                    id,
                    reason: err.to_string(),
                });
            },
            Err(err) => {
                tracing::warn!(
                    request_id = %id,
                    url = %url,
                    timeout = err.is_timeout(),
                    error = %err,
                    "No response received"
                );
                return Ok(None);
            },
        };

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();

        let limit = self.config.max_response_bytes;
        let total = response.content_length();
        if total.is_some_and(|total| usize::try_from(total).map_or(true, |total| total > limit)) {
            tracing::warn!(request_id = %id, limit, content_length = ?total, "Response exceeds size limit");
            return Ok(None);
        }

        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(request_id = %id, error = %err, "Connection lost while reading body");
                    return Ok(None);
                },
            };
            if body.len() + chunk.len() > limit {
                tracing::warn!(request_id = %id, limit, "Response body exceeds size limit");
                return Ok(None);
            }
            body.extend_from_slice(&chunk);

            if let (Some(progress), Some(total)) = (progress, total) {
                let done = u64::try_from(body.len()).unwrap_or(u64::MAX);
                if let Some(percent) = ProgressReporter::percent_of(done, total) {
                    progress.report(percent);
                }
            }
        }
        if let Some(progress) = progress {
            progress.report(100);
        }

        Ok(Some(Response {
            status,
            headers,
            body: decode_body(&body),
        }))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(
        skip(self, request, progress),
        name = "http_transport",
        fields(request_id = %request.id(), method = %request.method())
    )]
    async fn execute(
        &self,
        request: Request,
        progress: Option<ProgressReporter>,
    ) -> Result<RequestOutcome, TransportError> {
        let (registration, cancelled) = self.register(request.id());
        let started = Instant::now();

        let settled = tokio::select! {
            biased;
            _ = cancelled => None,
            result = self.perform(&request, progress.as_ref()) => Some(result),
        };

        drop(registration);
        if let Some(progress) = &progress {
            progress.close();
        }

        let outcome = match settled {
            None => Ok(RequestOutcome::cancelled(request)),
            Some(Ok(Some(response))) => Ok(RequestOutcome::responded(request, response)),
            Some(Ok(None)) => Ok(RequestOutcome::connection_failed(request)),
            Some(Err(err)) => Err(err),
        };

        match &outcome {
            Ok(outcome) => {
                metrics::histogram!(TRANSPORT_DURATION, "kind" => outcome.kind().as_str())
                    .record(started.elapsed().as_secs_f64());
                tracing::debug!(kind = %outcome.kind(), "Transport settled");
            },
            Err(err) => {
                metrics::counter!(TRANSPORT_ERRORS).increment(1);
                tracing::error!(error = %err, "Transport failed unexpectedly");
            },
        }
        outcome
    }

    fn cancel(&self, id: RequestId) {
        let sender = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match sender {
            Some(sender) => {
                let _ = sender.send(());
                tracing::debug!(request_id = %id, "Cancelled in-flight request");
            },
            None => tracing::debug!(request_id = %id, "Ignoring cancel for unknown request"),
        }
    }
}

/// Removes the in-flight entry exactly once
struct Registration {
    in_flight: Registry,
    id: RequestId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

const fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Empty is `null`, JSON is parsed, anything else is kept as text
fn decode_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
