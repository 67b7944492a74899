//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use beacon_remote::api::ApiState;
use beacon_remote::{DispatchQueue, LoopbackTransport};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{Harness, harness, harness_with};

/// Build a test API router around a harness
fn build_test_router(h: &Harness) -> axum::Router {
    let (queue, _loop) = DispatchQueue::spawn(Arc::clone(&h.dispatcher));
    let state = Arc::new(ApiState::new(Arc::clone(&h.dispatcher), queue));
    beacon_remote::api::router(state)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_list_commands_builtins_first() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, json) = send(&app, "GET", "/api/commands", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 0);
    let rows = json["commands"].as_array().unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0]["payload"], "forward");
    assert_eq!(rows[0]["user_defined"], false);
}

#[tokio::test]
async fn test_add_override() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, json) = send(
        &app,
        "POST",
        "/api/commands",
        Some(json!({"trigger": "dance", "payload": "D"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["version"], 1);
    let rows = json["commands"].as_array().unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[6]["trigger"], "dance");
    assert_eq!(rows[6]["user_defined"], true);
}

#[tokio::test]
async fn test_add_blank_override_is_bad_request() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, json) = send(
        &app,
        "POST",
        "/api/commands",
        Some(json!({"trigger": "  ", "payload": "D"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_input");
    assert_eq!(h.dispatcher.vocabulary().read().await.version(), 0);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, json) = send(&app, "GET", "/api/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["summary"], "Disconnected");

    let (status, json) = send(&app, "POST", "/api/session/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "ready");
    assert_eq!(json["device"]["id"], "loopback-0");
    assert_eq!(json["summary"], "Connected to BBC micro:bit (loopback)");

    let (status, json) = send(&app, "POST", "/api/session/disconnect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "disconnected");
    assert_eq!(json["session"]["state"], "disconnected");

    let (_, json) = send(&app, "POST", "/api/session/disconnect", None).await;
    assert_eq!(json["outcome"], "already_disconnected");
    assert_eq!(json["message"], "Already Disconnected");
}

#[tokio::test]
async fn test_connect_while_connecting_conflicts() {
    let transport = LoopbackTransport::new();
    transport.hold_discovery();
    let h = harness_with(transport);
    let app = build_test_router(&h);

    let session = Arc::clone(&h.session);
    let pending = tokio::spawn(async move { session.connect().await });
    while h.transport.discover_calls() == 0 {
        tokio::task::yield_now().await;
    }

    let (status, json) = send(&app, "POST", "/api/session/connect", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "already_in_progress");

    h.transport.release_discovery();
    assert!(pending.await.unwrap().unwrap().is_ready());
    assert_eq!(h.transport.discover_calls(), 1);
}

#[tokio::test]
async fn test_connect_failure_is_bad_gateway() {
    let h = harness_with(LoopbackTransport::with_discovery(
        beacon_remote::transport::DiscoveryOutcome::Fail("no device".to_string()),
    ));
    let app = build_test_router(&h);

    let (status, json) = send(&app, "POST", "/api/session/connect", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "transport_error");

    let (_, json) = send(&app, "GET", "/api/session", None).await;
    assert_eq!(json["state"], "failed");
    assert_eq!(json["reason"], "transport error: no device");
}

#[tokio::test]
async fn test_utterance_dispatch_and_last() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, _) = send(&app, "GET", "/api/dispatch/last", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app,
        "POST",
        "/api/utterances",
        Some(json!({"text": "go forward"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "rejected");
    assert_eq!(json["detail"], "not connected");

    send(&app, "POST", "/api/session/connect", None).await;
    let (_, json) = send(
        &app,
        "POST",
        "/api/utterances",
        Some(json!({"text": "okay go forward please"})),
    )
    .await;
    assert_eq!(json["outcome"], "sent");
    assert_eq!(json["detail"], "forward");
    assert_eq!(h.transport.frames(), vec![b"forward\n".to_vec()]);

    let (status, json) = send(&app, "GET", "/api/dispatch/last", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["utterance"], "okay go forward please");
    assert_eq!(json["result"]["outcome"], "sent");
}

#[tokio::test]
async fn test_blank_utterance_is_bad_request() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, _) = send(
        &app,
        "POST",
        "/api/utterances",
        Some(json!({"text": " "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.dispatcher.last_result().is_none());
}

#[tokio::test]
async fn test_no_match_echoes_raw_utterance() {
    let h = harness();
    let app = build_test_router(&h);

    let (status, json) = send(
        &app,
        "POST",
        "/api/utterances",
        Some(json!({"text": "  Sing a song "})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "no_match");
    assert_eq!(json["detail"], "  Sing a song ");
    assert_eq!(h.dispatcher.last_result().unwrap().utterance, "  Sing a song ");
}
