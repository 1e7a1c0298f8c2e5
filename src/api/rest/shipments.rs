use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::presentation::dashboard::DeliveryOutcome;
use crate::state::AppState;

const MAX_PROOF_BYTES: usize = 10 * 1024 * 1024;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shipments", get(list_shipments))
        .route("/shipments/active", get(active_shipment))
        .route("/shipments/:id/status", patch(update_status))
        .route(
            "/shipments/:id/proofs",
            post(upload_proof).layer(DefaultBodyLimit::max(MAX_PROOF_BYTES)),
        )
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ShipmentStatus,
    pub notes: Option<String>,
}

async fn list_shipments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Shipment>>, AppError> {
    Ok(Json(state.dashboard.list_shipments().await?))
}

async fn active_shipment(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<Shipment>>, AppError> {
    Ok(Json(state.dashboard.active_shipment().await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = state
        .dashboard
        .update_status(&id, payload.status, payload.notes)
        .await?;
    Ok(Json(shipment))
}

/// Expects a multipart form with a `file` part.
async fn upload_proof(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DeliveryOutcome>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("failed to read multipart data: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("proof.jpg").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(format!("failed to read file bytes: {err}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(AppError::BadRequest(
            "multipart form must include a file".to_string(),
        ));
    };

    let outcome = state
        .dashboard
        .upload_proof_and_deliver(&id, bytes, &file_name)
        .await?;
    Ok(Json(outcome))
}
