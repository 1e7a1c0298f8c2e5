pub mod auth;
pub mod blobs;
pub mod location;
pub mod notifications;
pub mod profile;
pub mod shipments;
pub mod views;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .merge(auth::router())
        .merge(shipments::router())
        .merge(profile::router())
        .merge(location::router())
        .merge(notifications::router())
        .merge(views::router())
        .merge(blobs::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .fallback_service(assets)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    signed_in: bool,
    tracking: bool,
    stored_proofs: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.dashboard.snapshot();
    Json(HealthResponse {
        status: "ok",
        signed_in: snapshot.session.is_some(),
        tracking: snapshot.tracking,
        stored_proofs: state.blobs.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
