//! Sign-up Demo
//!
//! Submits a sign-up form to a versioned API and shows how the reply's field
//! messages land on the form.
//!
//! # Running the Example
//!
//! ```bash
//! FORMWIRE_BASE_URL=http://localhost:8080 cargo run -p signup-demo -- ada ada@example.com
//! ```
//!
//! The server is expected to answer `POST /v1/signup` with `201` on success
//! and a versioned envelope carrying `fieldMessages` otherwise.

#![allow(missing_docs)]

use formwire_core::endpoint::JsonEndpoint;
use formwire_core::enrich::{Field, unmatched_messages};
use formwire_core::envelope::ApiOutcome;
use formwire_core::field_path;
use formwire_core::message::{FieldMessagePath, Message, Severity};
use formwire_core::request::Method;
use formwire_macros::Enrich;
use formwire_runtime::metrics::describe_metrics;
use formwire_runtime::{
    ConnectionFailureMiddleware, GeneralMessagesMiddleware, HttpTransport, RequestScope,
    TracingMiddleware, TransportConfig,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Enrich, Clone, Debug)]
struct SignupForm {
    username: Field<String>,
    email: Field<String>,
    address: AddressForm,
}

#[derive(Enrich, Clone, Debug)]
struct AddressForm {
    #[enrich(path_part)]
    path_part: FieldMessagePath,
    street: Field<String>,
    city: Field<String>,
}

impl SignupForm {
    fn new(username: String, email: String) -> Self {
        Self {
            username: Field::at(username, field_path!["username"]),
            email: Field::at(email, field_path!["email"]),
            address: AddressForm {
                path_part: field_path!["address"],
                street: Field::at(String::new(), field_path!["street"]),
                city: Field::at(String::new(), field_path!["city"]),
            },
        }
    }

    fn payload(&self) -> SignupPayload {
        SignupPayload {
            username: self.username.value.clone(),
            email: self.email.value.clone(),
            address: AddressPayload {
                street: self.address.street.value.clone(),
                city: self.address.city.value.clone(),
            },
        }
    }

    fn fields(&self) -> [(&'static str, &Field<String>); 4] {
        [
            ("username", &self.username),
            ("email", &self.email),
            ("address.street", &self.address.street),
            ("address.city", &self.address.city),
        ]
    }
}

#[derive(Debug, Serialize)]
struct SignupPayload {
    username: String,
    email: String,
    address: AddressPayload,
}

#[derive(Debug, Serialize)]
struct AddressPayload {
    street: String,
    city: String,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

fn show(message: &Message) {
    match message.severity {
        Severity::Error => tracing::error!(id = %message.id, text = %message.translation.id, "Server says"),
        Severity::Warning => tracing::warn!(id = %message.id, text = %message.translation.id, "Server says"),
        Severity::Info | Severity::Success => {
            tracing::info!(id = %message.id, text = %message.translation.id, "Server says");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,formwire_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install an in-process metrics recorder
    let metrics = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    // 3. Build the transport and a scope for this "view"
    let mut config = TransportConfig::from_env()?;
    if config.base_url.is_none() {
        config.base_url = Some(DEFAULT_BASE_URL.to_owned());
    }
    tracing::info!(base_url = ?config.base_url, timeout = ?config.timeout, "Starting sign-up demo");

    let sink = Arc::new(show);
    let scope = RequestScope::named("signup", Arc::new(HttpTransport::new(config)?))
        .with_middleware(TracingMiddleware)
        .with_middleware(GeneralMessagesMiddleware::new(sink.clone()))
        .with_middleware(ConnectionFailureMiddleware::new(sink));

    // 4. Submit the form
    let mut args = std::env::args().skip(1);
    let username = args.next().unwrap_or_else(|| "ada".to_owned());
    let email = args.next().unwrap_or_default();
    let form = SignupForm::new(username, email);

    let endpoint: JsonEndpoint<SignupPayload, Created> =
        JsonEndpoint::new(Method::Post, "/v1/signup").with_success_status(201);
    let settled = scope.execute(&endpoint, form.payload())?.await?;

    // 5. Feed field messages back into the form
    match &settled.result {
        ApiOutcome::Cancelled => tracing::info!("Sign-up cancelled"),
        ApiOutcome::ConnectionFailed => tracing::warn!("Sign-up not sent: server unreachable"),
        ApiOutcome::Completed(result) if result.is_success() => {
            tracing::info!("Signed up");
        },
        ApiOutcome::Completed(_) => {
            if let Some(enriched) = settled.result.enrich(&form, &field_path![]) {
                for (name, field) in enriched.fields() {
                    for message in &field.messages {
                        tracing::warn!(field = name, id = %message.id, text = %message.translation.id, "Field rejected");
                    }
                }
            }
            for orphan in unmatched_messages(&form, settled.result.field_messages(), &field_path![]) {
                tracing::warn!(path = %orphan.path, id = %orphan.message.id, "Message for a field not on this form");
            }
        },
    }

    if let Some(created) = settled.result.into_data() {
        tracing::info!(user_id = created.id, "Account created");
    }

    tracing::debug!(metrics = %metrics.render(), "Metrics snapshot");
    Ok(())
}
