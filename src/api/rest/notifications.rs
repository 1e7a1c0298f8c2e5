use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::notification::PushMessage;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications/permission", post(request_permission))
        .route("/notifications/messages", get(list_messages))
}

#[derive(Serialize)]
pub struct PermissionResponse {
    pub enabled: bool,
    pub token: Option<String>,
}

async fn request_permission(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PermissionResponse>, AppError> {
    let token = state.dashboard.enable_notifications().await?;
    Ok(Json(PermissionResponse {
        enabled: token.is_some(),
        token,
    }))
}

async fn list_messages(State(state): State<Arc<AppState>>) -> Json<Vec<PushMessage>> {
    Json(state.dashboard.messages())
}
