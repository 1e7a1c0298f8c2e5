use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::observability::metrics::{outcome, Metrics};
use crate::platform::{BlobStore, DocumentStore, NewProof, PlatformError};

pub const PROOF_PREFIX: &str = "delivery-proofs";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadedProof {
    pub file_name: String,
    pub download_url: String,
}

/// Uploads delivery photos and records them on the shipment.
#[derive(Clone)]
pub struct ProofUploader {
    blobs: Arc<dyn BlobStore>,
    documents: Arc<dyn DocumentStore>,
    metrics: Metrics,
}

impl ProofUploader {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        documents: Arc<dyn DocumentStore>,
        metrics: Metrics,
    ) -> Self {
        Self {
            blobs,
            documents,
            metrics,
        }
    }

    /// Stores the file and appends its reference to the shipment. When the
    /// append fails the stored object is deleted again.
    pub async fn upload_proof(
        &self,
        shipment_id: &str,
        bytes: Bytes,
        file_name: &str,
    ) -> Result<UploadedProof, AppError> {
        let start = Instant::now();
        let result = self.store_and_attach(shipment_id, bytes, file_name).await;

        let label = outcome(&result);
        self.metrics
            .proof_upload_latency_seconds
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .proof_uploads_total
            .with_label_values(&[label])
            .inc();

        result
    }

    async fn store_and_attach(
        &self,
        shipment_id: &str,
        bytes: Bytes,
        file_name: &str,
    ) -> Result<UploadedProof, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Upload("file is empty".to_string()));
        }

        let stored_name = proof_file_name(shipment_id, file_name, Utc::now().timestamp_millis());
        let path = format!("{PROOF_PREFIX}/{stored_name}");
        let size = bytes.len();

        self.blobs
            .put(&path, bytes, content_type_for(file_name))
            .await
            .map_err(|err| {
                error!(shipment_id, %path, error = %err, "proof upload failed");
                AppError::Upload(err.to_string())
            })?;

        let download_url = match self.blobs.download_url(&path).await {
            Ok(url) => url,
            Err(err) => {
                error!(shipment_id, %path, error = %err, "could not resolve proof url");
                self.discard(&path).await;
                return Err(AppError::Upload(err.to_string()));
            }
        };

        let proof = NewProof {
            url: download_url.clone(),
            file_name: stored_name.clone(),
        };
        if let Err(err) = self.documents.append_proof(shipment_id, proof).await {
            error!(shipment_id, error = %err, "failed to attach proof to shipment");
            self.discard(&path).await;
            return Err(match err {
                PlatformError::NotFound(what) => AppError::NotFound(what),
                other => AppError::Upload(other.to_string()),
            });
        }

        info!(shipment_id, file_name = %stored_name, size, "delivery proof uploaded");
        Ok(UploadedProof {
            file_name: stored_name,
            download_url,
        })
    }

    pub async fn get_proof_url(&self, path: &str) -> Result<String, AppError> {
        self.blobs.download_url(path).await.map_err(|err| {
            error!(%path, error = %err, "failed to resolve proof url");
            match err {
                PlatformError::NotFound(what) => AppError::NotFound(what),
                other => AppError::Upload(other.to_string()),
            }
        })
    }

    async fn discard(&self, path: &str) {
        if let Err(err) = self.blobs.delete(path).await {
            warn!(%path, error = %err, "orphaned proof object left in storage");
        }
    }
}

/// `{shipment}_{millis}_{name}` with anything outside `[A-Za-z0-9._-]`
/// replaced so the result is a single path segment.
pub fn proof_file_name(shipment_id: &str, original: &str, millis: i64) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        cleaned = "proof".to_string();
    }

    let shipment: String = shipment_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    format!("{shipment}_{millis}_{cleaned}")
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
