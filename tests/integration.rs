use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use driver_dashboard::api::rest::router;
use driver_dashboard::platform::memory::{MemoryOptions, MemoryPlatform, SeedData};
use driver_dashboard::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

const SEED: &str = r#"{
    "drivers": [
        {"email": "ana@example.com", "password": "secret-1", "name": "Ana", "vehicle": "Van 3"},
        {"email": "ben@example.com", "password": "secret-2", "name": "Ben"}
    ],
    "shipments": [
        {"id": "S1", "driver_email": "ana@example.com", "status": "pending",
         "customer": "Acme", "address": "1 Dock Rd", "created_at": "2024-01-01T08:00:00Z"},
        {"id": "S2", "driver_email": "ana@example.com", "status": "in_transit",
         "customer": "Globex", "created_at": "2024-01-01T09:00:00Z",
         "destination": {"address": "5 Pier St", "coordinates": {"latitude": 40.7, "longitude": -74.0}}},
        {"id": "B1", "driver_email": "ben@example.com", "customer": "Initech", "address": "9 Elm St"}
    ]
}"#;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&MemoryOptions::default()));
    (router(state.clone()), state)
}

async fn seeded() -> (axum::Router, Arc<AppState>) {
    let memory = MemoryPlatform::new(&MemoryOptions::default());
    memory
        .seed(&SeedData::from_json(SEED).unwrap())
        .await
        .unwrap();
    let state = Arc::new(AppState::with_platform(memory, 1024));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(uri: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "proof-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn login(app: &axum::Router, email: &str, password: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Polls `/dashboard` until `check` accepts the snapshot.
async fn dashboard_until<F>(app: &axum::Router, check: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    for _ in 0..200 {
        let response = app.clone().oneshot(get_request("/dashboard")).await.unwrap();
        let body = body_json(response).await;
        if check(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("dashboard never reached the expected state");
}

fn tab<'a>(snapshot: &'a Value, name: &str) -> &'a Value {
    snapshot["board"]["tabs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|tab| tab["tab"] == name)
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["signed_in"], false);
    assert_eq!(body["tracking"], false);
    assert_eq!(body["stored_proofs"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_subscriptions"));
}

#[tokio::test]
async fn signup_creates_available_profile() {
    let (app, _state) = setup();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            json!({ "email": "cam@example.com", "password": "secret-9", "name": "Cam" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let session = body_json(response).await;
    assert_eq!(session["email"], "cam@example.com");

    let response = app.clone().oneshot(get_request("/profile")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await;
    assert_eq!(profile["name"], "Cam");
    assert_eq!(profile["email"], "cam@example.com");
    assert_eq!(profile["status"], "available");

    let response = app.oneshot(get_request("/auth/session")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["session"]["uid"], session["uid"]);
}

#[tokio::test]
async fn signup_short_password_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            json!({ "email": "cam@example.com", "password": "123", "name": "Cam" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_signup_returns_409() {
    let (app, _state) = seeded().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            json!({ "email": "ana@example.com", "password": "secret-1", "name": "Ana 2" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_returns_401_and_a_toast() {
    let (app, _state) = seeded().await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "ana@example.com", "password": "nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(get_request("/toasts")).await.unwrap();
    let toasts = body_json(response).await;
    let toasts = toasts.as_array().unwrap();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0]["variant"], "destructive");

    let id = toasts[0]["id"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(delete_request(&format!("/toasts/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(delete_request(&format!("/toasts/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shipments_without_session_return_401() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/shipments")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn board_groups_driver_shipments() {
    let (app, _state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app.clone().oneshot(get_request("/shipments")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let shipments = body_json(response).await;
    let ids: Vec<&str> = shipments
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["S2", "S1"]);

    let snapshot = dashboard_until(&app, |body| body["board"]["total"] == 2).await;
    assert_eq!(tab(&snapshot, "pending")["count"], 1);
    assert_eq!(tab(&snapshot, "active")["count"], 1);
    assert_eq!(tab(&snapshot, "completed")["count"], 0);
    assert_eq!(snapshot["board"]["default_tab"], "active");

    let response = app.oneshot(get_request("/shipments/active")).await.unwrap();
    let active = body_json(response).await;
    assert_eq!(active["id"], "S2");
}

#[tokio::test]
async fn status_moves_forward_only() {
    let (app, state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/shipments/S1/status",
            json!({ "status": "in_transit", "notes": "picked up" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "in_transit");
    assert_eq!(body["notes"], "picked up");
    assert!(body["status_history"]["in_transit"].is_string());

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/shipments/S1/status",
            json!({ "status": "pending" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/shipments/missing/status",
            json!({ "status": "delivered" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/shipments/B1/status",
            json!({ "status": "in_transit" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let updates = state.metrics.encode().unwrap();
    assert!(updates.contains("status_updates_total{outcome=\"success\"} 1"));
}

#[tokio::test]
async fn proof_upload_delivers_and_serves_the_file() {
    let (app, state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .clone()
        .oneshot(multipart_request("/shipments/S2/proofs", "door.jpg", b"jpeg-bytes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let outcome = body_json(response).await;
    assert_eq!(outcome["shipment"]["status"], "delivered");
    assert_eq!(
        outcome["shipment"]["delivery_proofs"].as_array().unwrap().len(),
        1
    );
    assert_eq!(state.blobs.len(), 1);

    let url = outcome["proof"]["download_url"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost:3000").unwrap();

    let response = app.clone().oneshot(get_request(path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(body_string(response).await, "jpeg-bytes");

    let untokened = path.split_once('?').unwrap().0;
    let response = app.oneshot(get_request(untokened)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_proof_upload_is_rejected() {
    let (app, state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .oneshot(multipart_request("/shipments/S2/proofs", "empty.jpg", b""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(state.blobs.is_empty());
}

#[tokio::test]
async fn proof_upload_requires_an_in_transit_shipment() {
    let (app, state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .clone()
        .oneshot(multipart_request("/shipments/S1/proofs", "early.jpg", b"jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(state.blobs.is_empty());

    let response = app
        .clone()
        .oneshot(multipart_request("/shipments/S2/proofs", "door.jpg", b"jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(multipart_request("/shipments/S2/proofs", "again.jpg", b"jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(state.blobs.len(), 1);
}

#[tokio::test]
async fn tracking_start_and_stop() {
    let (app, _state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/location/tracking",
            json!({ "enabled": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["tracking"], true);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/location/position",
            json!({ "latitude": 40.71, "longitude": -74.01, "accuracy_m": 5.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .clone()
        .oneshot(get_request("/location/current"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["coords"]["latitude"], 40.71);

    let response = app
        .clone()
        .oneshot(delete_request("/location/tracking"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["stopped"], true);

    let response = app
        .oneshot(delete_request("/location/tracking"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["stopped"], false);
}

#[tokio::test]
async fn out_of_range_position_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/location/position",
            json!({ "latitude": 123.0, "longitude": 0.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn map_navigates_to_active_destination() {
    let (app, _state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app.clone().oneshot(get_request("/map")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let map = body_json(response).await;
    assert_eq!(map["active"]["shipment_id"], "S2");
    assert_eq!(map["location_label"], "Location not available");

    let response = app.oneshot(get_request("/map/navigation")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["url"],
        "https://www.google.com/maps/dir/?api=1&destination=40.7,-74"
    );
}

#[tokio::test]
async fn notification_permission_registers_token() {
    let (app, _state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .oneshot(json_request("POST", "/notifications/permission", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["enabled"], true);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn logout_clears_the_session() {
    let (app, _state) = seeded().await;
    login(&app, "ana@example.com", "secret-1").await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth/logout", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get_request("/shipments")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
