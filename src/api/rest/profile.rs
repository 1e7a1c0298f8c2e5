use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::driver::DriverPatch;
use crate::presentation::profile::ProfileView;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/profile", get(get_profile).patch(update_profile))
}

async fn get_profile(State(state): State<Arc<AppState>>) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(state.dashboard.profile_view().await?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<DriverPatch>,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(state.dashboard.update_profile(patch).await?))
}
