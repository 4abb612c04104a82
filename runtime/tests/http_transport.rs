//! `HttpTransport` against a local mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use formwire_core::endpoint::JsonEndpoint;
use formwire_core::envelope::ApiOutcome;
use formwire_core::outcome::OutcomeKind;
use formwire_core::request::{Method, Request};
use formwire_core::transport::{ProgressReporter, Transport};
use formwire_runtime::{ConnectionFailureMiddleware, HttpTransport, RequestScope, TransportConfig};
use formwire_testing::{RecordingSink, success_body};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(TransportConfig::default().with_base_url(server.uri())).unwrap()
}

// ============================================================================
// Request construction
// ============================================================================

#[tokio::test]
async fn test_get_with_query_headers_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users"))
        .and(query_param("page", "2"))
        .and(query_param("active", "true"))
        .and(header("x-client", "web"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        TransportConfig::default()
            .with_base_url(server.uri())
            .with_default_header("X-Client", "web")
            .with_bearer_token("secret"),
    )
    .unwrap();
    let request = Request::new(Method::Get, "/v1/users")
        .with_query("page", 2_i64)
        .with_query("active", true);

    let outcome = transport.execute(request, None).await.unwrap();

    assert_eq!(outcome.kind(), OutcomeKind::Responded);
    assert_eq!(outcome.response().unwrap().body, success_body(json!([])));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/signup"))
        .and(body_json(json!({"username": "ada"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(success_body(json!({"id": 1}))))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = transport_for(&server)
        .execute(
            Request::new(Method::Post, "/v1/signup").with_body(json!({"username": "ada"})),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.response().unwrap().status, 201);
}

// ============================================================================
// Responses
// ============================================================================

#[tokio::test]
async fn test_error_status_is_a_response_not_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "success": false,
            "fieldMessages": [],
            "generalMessages": []
        })))
        .mount(&server)
        .await;

    let outcome = transport_for(&server)
        .execute(Request::new(Method::Put, "/v1/profile"), None)
        .await
        .unwrap();

    assert_eq!(outcome.kind(), OutcomeKind::Responded);
    assert_eq!(outcome.response().unwrap().status, 422);
}

#[tokio::test]
async fn test_non_json_body_is_kept_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let outcome = transport_for(&server)
        .execute(Request::new(Method::Get, "/"), None)
        .await
        .unwrap();

    let response = outcome.response().unwrap();
    assert_eq!(response.body, json!("Bad Gateway"));
    assert!(response.header("content-type").is_some());
}

#[tokio::test]
async fn test_oversized_body_is_a_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1024)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        TransportConfig::default()
            .with_base_url(server.uri())
            .with_max_response_bytes(16),
    )
    .unwrap();

    let outcome = transport
        .execute(Request::new(Method::Get, "/big"), None)
        .await
        .unwrap();

    assert_eq!(outcome.kind(), OutcomeKind::ConnectionFailed);
    assert!(outcome.response().is_none());
    assert_eq!(transport.in_flight_count(), 0);
}

#[tokio::test]
async fn test_oversized_body_reaches_outcome_hooks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1024)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        TransportConfig::default()
            .with_base_url(server.uri())
            .with_max_response_bytes(16),
    )
    .unwrap();
    let sink = RecordingSink::new();
    let scope = RequestScope::new(Arc::new(transport))
        .with_middleware(ConnectionFailureMiddleware::new(Arc::new(sink.clone())));
    let endpoint: JsonEndpoint<Value, Value> = JsonEndpoint::new(Method::Get, "/big");

    let settled = scope
        .execute(&endpoint, json!({}))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(settled.result, ApiOutcome::ConnectionFailed);
    assert_eq!(sink.messages().len(), 1);
    assert_eq!(sink.messages()[0].id, ConnectionFailureMiddleware::MESSAGE_ID);
}

#[tokio::test]
async fn test_download_progress_ends_at_100() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(json!("x".repeat(4096)))))
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let reporter = ProgressReporter::new({
        let seen = Arc::clone(&seen);
        move |percent| seen.lock().unwrap().push(percent)
    });

    transport_for(&server)
        .execute(Request::new(Method::Get, "/file"), Some(reporter.clone()))
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(reporter.last(), Some(100));
}

// ============================================================================
// Connectivity and cancellation
// ============================================================================

#[tokio::test]
async fn test_timeout_is_a_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        TransportConfig::default()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let outcome = transport
        .execute(Request::new(Method::Get, "/slow"), None)
        .await
        .unwrap();

    assert_eq!(outcome.kind(), OutcomeKind::ConnectionFailed);
    assert!(!outcome.is_cancelled());
}

#[tokio::test]
async fn test_unreachable_host_is_a_connection_failure() {
    let transport =
        HttpTransport::new(TransportConfig::default().with_base_url("http://127.0.0.1:1")).unwrap();

    let outcome = transport
        .execute(Request::new(Method::Get, "/"), None)
        .await
        .unwrap();

    assert_eq!(outcome.kind(), OutcomeKind::ConnectionFailed);
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let request = Request::new(Method::Get, "/slow");
    let id = request.id();
    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.execute(request, None).await }
    });

    while transport.in_flight_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    transport.cancel(id);

    let outcome = tokio::time::timeout(Duration::from_secs(1), call)
        .await
        .expect("cancel should settle the call promptly")
        .unwrap()
        .unwrap();
    assert!(outcome.is_cancelled());
    assert!(outcome.response().is_none());
    assert_eq!(transport.in_flight_count(), 0);
}

// ============================================================================
// Through a scope
// ============================================================================

#[derive(Debug, Serialize)]
struct Lookup {
    id: u64,
    verbose: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    name: String,
}

#[tokio::test]
async fn test_scope_over_http_decodes_typed_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/7"))
        .and(query_param("verbose", "false"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_body(json!({"name": "Ada"}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let scope = RequestScope::new(Arc::new(transport_for(&server)));
    let endpoint: JsonEndpoint<Lookup, User, Value> =
        JsonEndpoint::new(Method::Get, "/v1/users/{id}");

    let settled = scope
        .execute(&endpoint, Lookup { id: 7, verbose: false })
        .unwrap()
        .await
        .unwrap();

    assert_eq!(
        settled.result.into_data(),
        Some(User {
            name: "Ada".to_owned()
        })
    );
}
