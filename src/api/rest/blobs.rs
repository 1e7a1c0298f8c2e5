use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::platform::{BlobStore, PlatformError};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/blobs/*path", get(download))
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

/// Serves stored objects to holders of their download URL. A wrong or
/// missing token looks the same as a missing object.
async fn download(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let authorized = query
        .token
        .as_deref()
        .is_some_and(|token| state.blobs.token_matches(&path, token));
    if !authorized {
        debug!(%path, "blob request without a valid token");
        return Err(AppError::NotFound(format!("object {path}")));
    }

    let blob = state.blobs.read(&path).await.map_err(|err| match err {
        PlatformError::NotFound(what) => AppError::NotFound(what),
        other => AppError::Internal(other.to_string()),
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        blob.bytes,
    )
        .into_response())
}
