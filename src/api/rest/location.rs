use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo;
use crate::models::driver::GeoPoint;
use crate::platform::Position;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/location/tracking", post(set_tracking).delete(stop_tracking))
        .route("/location/current", get(current_position))
        .route("/location/position", post(device_sample))
}

/// `enabled` absent toggles the current state.
#[derive(Deserialize, Default)]
pub struct TrackingRequest {
    pub enabled: Option<bool>,
}

#[derive(Serialize)]
pub struct TrackingResponse {
    pub tracking: bool,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

/// A sample forwarded by the device. `denied` reports a revoked permission.
#[derive(Deserialize)]
pub struct DeviceSample {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: Option<f64>,
    #[serde(default)]
    pub denied: bool,
}

async fn set_tracking(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<TrackingRequest>>,
) -> Result<Json<TrackingResponse>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let tracking = match request.enabled {
        Some(true) => state.dashboard.start_tracking()?,
        Some(false) => {
            state.dashboard.stop_tracking();
            false
        }
        None => state.dashboard.toggle_tracking()?,
    };
    Ok(Json(TrackingResponse { tracking }))
}

async fn stop_tracking(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    Json(StopResponse {
        stopped: state.dashboard.stop_tracking(),
    })
}

async fn current_position(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Position>, AppError> {
    Ok(Json(state.dashboard.locate().await?))
}

async fn device_sample(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<DeviceSample>,
) -> Result<StatusCode, AppError> {
    state.device.set_denied(sample.denied);
    if sample.denied {
        return Ok(StatusCode::ACCEPTED);
    }

    let (Some(latitude), Some(longitude)) = (sample.latitude, sample.longitude) else {
        return Err(AppError::BadRequest(
            "latitude and longitude are required".to_string(),
        ));
    };
    let coords = GeoPoint {
        latitude,
        longitude,
    };
    if !geo::is_valid(&coords) {
        return Err(AppError::BadRequest("coordinates out of range".to_string()));
    }

    state.device.publish(Position {
        coords,
        accuracy_m: sample.accuracy_m,
        timestamp: Utc::now(),
    });
    Ok(StatusCode::ACCEPTED)
}
