use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::shipment::ShipmentStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already in use")]
    EmailInUse,

    #[error("no account for this email")]
    UnknownEmail,

    #[error("{0}")]
    InvalidInput(String),

    #[error("could not create driver profile: {0}")]
    ProfileCreation(String),

    #[error("identity service unreachable: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("timed out waiting for a position fix")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("push registration failed: {0}")]
    Registration(String),

    #[error("not supported on this device: {0}")]
    Capability(String),

    #[error("positioning failed: {0}")]
    Position(#[from] PositionError),

    #[error("cannot move shipment from {from} to {to}")]
    InvalidTransition {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short headline used when the error is surfaced as a toast.
    pub fn title(&self) -> &'static str {
        match self {
            AppError::Auth(_) | AppError::Unauthenticated => "Authentication error",
            AppError::NotFound(_) => "Not found",
            AppError::Upload(_) => "Upload failed",
            AppError::Registration(_) => "Notifications unavailable",
            AppError::Capability(_) => "Not supported",
            AppError::Position(_) => "Location error",
            AppError::InvalidTransition { .. } => "Status update rejected",
            AppError::BadRequest(_) => "Invalid request",
            AppError::Internal(_) => "Something went wrong",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Auth(AuthError::InvalidCredentials) | AppError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Auth(AuthError::EmailInUse) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::UnknownEmail) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Auth(AuthError::InvalidInput(_)) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Auth(AuthError::Network(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Auth(AuthError::ProfileCreation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upload(_) | AppError::Registration(_) => StatusCode::BAD_GATEWAY,
            AppError::Capability(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Position(PositionError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Position(PositionError::PermissionDenied) => StatusCode::FORBIDDEN,
            AppError::Position(PositionError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
