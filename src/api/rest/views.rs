use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::Json;
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::presentation::map::MapView;
use crate::presentation::toast::Toast;
use crate::presentation::DashboardSnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/map", get(map))
        .route("/map/navigation", get(navigation))
        .route("/toasts", get(list_toasts))
        .route("/toasts/:id", delete(dismiss_toast))
}

#[derive(Serialize)]
pub struct NavigationResponse {
    pub url: String,
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardSnapshot> {
    Json(state.dashboard.snapshot())
}

async fn map(State(state): State<Arc<AppState>>) -> Result<Json<MapView>, AppError> {
    Ok(Json(state.dashboard.map_view().await?))
}

async fn navigation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NavigationResponse>, AppError> {
    let url = state.dashboard.navigate().await?;
    Ok(Json(NavigationResponse { url }))
}

async fn list_toasts(State(state): State<Arc<AppState>>) -> Json<Vec<Toast>> {
    Json(state.dashboard.toasts())
}

async fn dismiss_toast(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.dashboard.dismiss_toast(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("toast {id} not found")))
    }
}
