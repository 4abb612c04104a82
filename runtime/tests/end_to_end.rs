//! A form submission from request to enriched state tree.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use formwire_core::endpoint::JsonEndpoint;
use formwire_core::enrich::unmatched_messages;
use formwire_core::envelope::ApiOutcome;
use formwire_core::field_path;
use formwire_core::request::Method;
use formwire_runtime::{
    ConnectionFailureMiddleware, GeneralMessagesMiddleware, RequestScope, TracingMiddleware,
};
use formwire_testing::{
    MockReply, MockTransport, RecordingSink, error_body, field_message, message, success_body,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct Signup {
    username: String,
    email: String,
}

fn signup_endpoint() -> JsonEndpoint<Signup, Value, Value> {
    JsonEndpoint::new(Method::Post, "/v1/signup").with_success_status(201)
}

fn signup() -> Signup {
    Signup {
        username: "ada".to_owned(),
        email: "ada@example.com".to_owned(),
    }
}

fn form_tree() -> Value {
    json!({
        "username": {"kind": "textInput", "pathPart": ["username"], "value": "ada", "messages": []},
        "email": {"kind": "textInput", "pathPart": ["email"], "value": "ada@example.com", "messages": []},
        "address": {
            "pathPart": ["address"],
            "street": {"kind": "textInput", "pathPart": ["street"], "value": "", "messages": []}
        },
        "terms": {"kind": "checkbox", "value": true, "messages": []}
    })
}

fn scope_with_sink(transport: MockTransport, sink: &RecordingSink) -> RequestScope {
    RequestScope::named("signup", Arc::new(transport))
        .with_middleware(TracingMiddleware)
        .with_middleware(GeneralMessagesMiddleware::new(Arc::new(sink.clone())))
        .with_middleware(ConnectionFailureMiddleware::new(Arc::new(sink.clone())))
}

// ============================================================================
// Validation failure
// ============================================================================

#[tokio::test]
async fn test_validation_failure_enriches_form_and_shows_general_messages() {
    let transport = MockTransport::new();
    transport.push_reply(MockReply::respond(
        422,
        error_body(
            &[
                field_message(field_path!["username"], "usernameTaken"),
                field_message(field_path!["address", "street"], "required"),
                field_message(field_path!["nickname"], "tooShort"),
            ],
            &[message("checkInput")],
        ),
    ));
    let sink = RecordingSink::new();
    let scope = scope_with_sink(transport.clone(), &sink);

    let settled = scope
        .execute(&signup_endpoint(), signup())
        .unwrap()
        .await
        .unwrap();

    assert!(!settled.result.is_success());
    assert_eq!(
        transport.requests()[0].body(),
        Some(&json!({"username": "ada", "email": "ada@example.com"}))
    );

    let tree = form_tree();
    let enriched = settled.result.enrich(&tree, &field_path![]).unwrap();
    assert_eq!(enriched["username"]["messages"][0]["id"], "usernameTaken");
    assert_eq!(enriched["email"]["messages"], json!([]));
    assert_eq!(enriched["address"]["street"]["messages"][0]["id"], "required");
    assert_eq!(enriched["terms"], tree["terms"]);

    let unmatched = unmatched_messages(&tree, settled.result.field_messages(), &field_path![]);
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].path, field_path!["nickname"]);

    let shown: Vec<String> = sink.messages().into_iter().map(|m| m.id).collect();
    assert_eq!(shown, vec!["checkInput"]);
}

#[tokio::test]
async fn test_successful_resubmit_clears_previous_messages() {
    let transport = MockTransport::new();
    transport.push_reply(MockReply::respond(
        422,
        error_body(&[field_message(field_path!["username"], "usernameTaken")], &[]),
    ));
    transport.push_reply(MockReply::respond(201, success_body(json!({"id": 42}))));
    let sink = RecordingSink::new();
    let scope = scope_with_sink(transport, &sink);

    let first = scope
        .execute(&signup_endpoint(), signup())
        .unwrap()
        .await
        .unwrap();
    let tree = first.result.enrich(&form_tree(), &field_path![]).unwrap();
    assert_eq!(tree["username"]["messages"].as_array().unwrap().len(), 1);

    let second = scope
        .execute(&signup_endpoint(), signup())
        .unwrap()
        .await
        .unwrap();
    assert!(second.result.is_success());
    let tree = second.result.enrich(&tree, &field_path![]).unwrap();

    assert_eq!(tree["username"]["messages"], json!([]));
    assert!(sink.is_empty());
}

// ============================================================================
// Connectivity loss
// ============================================================================

#[tokio::test]
async fn test_connectivity_loss_shows_one_message_and_leaves_form_alone() {
    let transport = MockTransport::new().with_fallback(MockReply::ConnectionFailure);
    let sink = RecordingSink::new();
    let scope = scope_with_sink(transport, &sink);

    let settled = scope
        .execute(&signup_endpoint(), signup())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(settled.result, ApiOutcome::ConnectionFailed);
    assert!(!settled.is_cancelled());
    assert!(settled.result.enrich(&form_tree(), &field_path![]).is_none());

    let shown = sink.messages();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].id, ConnectionFailureMiddleware::MESSAGE_ID);
    assert_eq!(scope.pending_count(), 0);
}

#[tokio::test]
async fn test_cancellation_is_silent() {
    let transport = MockTransport::new().with_fallback(MockReply::Hang);
    let sink = RecordingSink::new();
    let scope = scope_with_sink(transport, &sink);

    let in_flight = scope.execute(&signup_endpoint(), signup()).unwrap();
    scope.cancel_request_by_id(in_flight.id());
    let settled = in_flight.await.unwrap();

    assert_eq!(settled.result, ApiOutcome::Cancelled);
    assert!(sink.is_empty());
}
