//! API integration tests driven through the router

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use coordinator_core::service::CoordinatorConfig;
use coordinator_svc::{app, AppState};
use worker_bus::ChannelBus;

fn test_app() -> (Router, Arc<AppState>) {
    let bus = Arc::new(ChannelBus::new(16, 3600));
    let state = Arc::new(AppState::new(CoordinatorConfig::default(), bus));
    (app(state.clone()), state)
}

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

async fn sign_up(app: &Router, email: &str) -> Value {
    let (status, user) = request(
        app,
        Method::POST,
        "/api/sign_up",
        Some(json!({ "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    user
}

async fn create_key(app: &Router, user_id: &str) -> String {
    let (status, user) = request(
        app,
        Method::POST,
        "/api/public_keys",
        Some(json!({
            "user_id": user_id,
            "participants_count": 3,
            "participant_index": 1,
            "participants_threshold": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    user["public_keys"][0].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_service_identity() {
    let (app, _) = test_app();

    let (status, body) = request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "coordinator-svc");
}

#[tokio::test]
async fn sign_up_then_key_round_trip() {
    let (app, state) = test_app();

    let user = sign_up(&app, "ops@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    assert_eq!(user["public_keys"], json!([]));

    let key_id = create_key(&app, user_id).await;

    let (status, key) = request(&app, Method::GET, &format!("/api/key?id={key_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(key["status"], "created");
    assert_eq!(key["participants_count"], 3);
    assert_eq!(key["participants_confirmations"], json!([]));

    // The join command went out on the bus
    let published = state.bus.recent();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].command.action(), "keygen_join");
}

#[tokio::test]
async fn missing_entities_are_structured_404s() {
    let (app, _) = test_app();

    let (status, body) = request(&app, Method::GET, "/api/user?id=missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, body) = request(&app, Method::GET, "/api/key?id=missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = request(
        &app,
        Method::POST,
        "/api/public_keys",
        Some(json!({ "user_id": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_user_changes_email() {
    let (app, _) = test_app();

    let user = sign_up(&app, "old@example.com").await;
    let user_id = user["id"].as_str().unwrap();

    let (status, user) = request(
        &app,
        Method::PUT,
        "/api/user",
        Some(json!({ "id": user_id, "email": "new@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "new@example.com");
}

#[tokio::test]
async fn delete_key_twice_is_safe() {
    let (app, _) = test_app();

    let user = sign_up(&app, "ops@example.com").await;
    let user_id = user["id"].as_str().unwrap().to_string();
    let key_id = create_key(&app, &user_id).await;

    let body = json!({ "user_id": user_id, "public_key_id": key_id });

    let (status, user) = request(&app, Method::DELETE, "/api/public_keys", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["public_keys"], json!([]));

    let (status, _) = request(&app, Method::DELETE, "/api/public_keys", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn worker_events_drive_key_state() {
    let (app, _) = test_app();

    let user = sign_up(&app, "ops@example.com").await;
    let key_id = create_key(&app, user["id"].as_str().unwrap()).await;

    let (_, key) = request(&app, Method::GET, &format!("/api/key?id={key_id}"), None).await;
    let room_id = key["room_id"].as_str().unwrap();

    let (status, _) = request(
        &app,
        Method::POST,
        "/v1/event",
        Some(json!({
            "action": "keygen_status",
            "room_id": room_id,
            "status": "started",
            "active_indexes": [0, 1]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, key) = request(&app, Method::GET, &format!("/api/key?id={key_id}"), None).await;
    assert_eq!(key["status"], "started");
    assert_eq!(key["participants_confirmations"], json!([0, 1]));

    let (status, _) = request(
        &app,
        Method::POST,
        "/v1/event",
        Some(json!({
            "action": "keygen_status",
            "room_id": room_id,
            "status": "finished",
            "public_key": "pk1",
            "active_indexes": [0, 1, 2]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // A late report is acknowledged but dropped; the key stays finished
    let (status, _) = request(
        &app,
        Method::POST,
        "/v1/event",
        Some(json!({
            "action": "keygen_status",
            "room_id": room_id,
            "status": "started",
            "active_indexes": [0]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, key) = request(&app, Method::GET, &format!("/api/key?id={key_id}"), None).await;
    assert_eq!(key["status"], "finished");
    assert_eq!(key["public_key"], "pk1");
}

#[tokio::test]
async fn signing_session_flow_over_http() {
    let (app, state) = test_app();

    let user = sign_up(&app, "ops@example.com").await;
    let key_id = create_key(&app, user["id"].as_str().unwrap()).await;

    let (status, key) = request(
        &app,
        Method::POST,
        "/api/sign",
        Some(json!({
            "public_key_id": key_id,
            "data": "deadbeef",
            "metadata": { "origin": "tests" },
            "participant_indexes": [0, 1]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rooms = key["rooms"].as_object().unwrap();
    assert_eq!(rooms.len(), 1);
    let signing_id = rooms.keys().next().unwrap().clone();
    assert_eq!(rooms[&signing_id]["status"], "created");

    assert_eq!(
        state.bus.recent().last().unwrap().command.action(),
        "sign_approve"
    );

    let (status, _) = request(
        &app,
        Method::POST,
        "/v1/event",
        Some(json!({
            "action": "sign_status",
            "room_id": signing_id,
            "status": "finished",
            "result": "sig1",
            "active_indexes": [0, 1]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, key) = request(&app, Method::GET, &format!("/api/key?id={key_id}"), None).await;
    let room = &key["rooms"][&signing_id];
    assert_eq!(room["status"], "finished");
    assert_eq!(room["result"], "sig1");
    assert_eq!(room["participants_confirmations"], json!([0, 1]));
}

#[tokio::test]
async fn unresolvable_event_is_acknowledged_not_fatal() {
    let (app, _) = test_app();

    let (status, _) = request(
        &app,
        Method::POST,
        "/v1/event",
        Some(json!({
            "action": "keygen_status",
            "room_id": "nowhere",
            "status": "started"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // The service keeps answering after the bad event
    let (status, _) = request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_event_is_unprocessable() {
    let (app, _) = test_app();

    let (status, _) = request(
        &app,
        Method::POST,
        "/v1/event",
        Some(json!({ "action": "keygen_status" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
