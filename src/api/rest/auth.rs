use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(password_reset))
        .route("/auth/session", get(current_session))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session: Option<Session>,
    pub loading: bool,
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let session = state
        .dashboard
        .register(&payload.email, &payload.password, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .dashboard
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(session))
}

async fn logout(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.dashboard.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<StatusCode, AppError> {
    state.dashboard.reset_password(&payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn current_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let snapshot = state.dashboard.snapshot();
    Json(SessionResponse {
        session: state.dashboard.current_session(),
        loading: snapshot.session_loading,
    })
}
