//! Contracts for the hosted platform the console runs against.
//!
//! Identity, documents, blobs, push messaging and device positioning are all
//! external collaborators. The services in `crate::services` only ever talk to
//! them through these traits.

pub mod memory;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::models::driver::{DriverPatch, DriverProfile, GeoPoint};
use crate::models::notification::{Permission, PushMessage};
use crate::models::session::Session;
use crate::models::shipment::{Shipment, ShipmentStatus};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already in use")]
    EmailInUse,

    #[error("no account for this email")]
    UnknownEmail,

    #[error("precondition failed: {0}")]
    Conflict(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("unsupported in this runtime: {0}")]
    Unsupported(String),

    #[error("timed out")]
    Timeout,

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the account and signs it in.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> PlatformResult<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<Session>;

    async fn sign_out(&self) -> PlatformResult<()>;

    async fn delete_account(&self, uid: &str) -> PlatformResult<()>;

    async fn send_password_reset(&self, email: &str) -> PlatformResult<()>;

    /// Persisted session of this device. The current value is the live session.
    fn session_changes(&self) -> watch::Receiver<Option<Session>>;
}

/// Field writes on a driver record. Timestamps are stamped by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverUpdate {
    Profile(DriverPatch),
    Location(GeoPoint),
    AddPushToken(String),
}

/// Field writes on a shipment record. Timestamps are stamped by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ShipmentUpdate {
    /// Applied only while the stored status still equals `expected`.
    Status {
        expected: ShipmentStatus,
        status: ShipmentStatus,
        notes: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProof {
    pub url: String,
    pub file_name: String,
}

/// Equality filter on driver and optional status, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentQuery {
    pub driver_id: String,
    pub status: Option<ShipmentStatus>,
    pub limit: Option<usize>,
}

impl ShipmentQuery {
    pub fn for_driver(driver_id: impl Into<String>) -> Self {
        Self {
            driver_id: driver_id.into(),
            status: None,
            limit: None,
        }
    }

    pub fn with_status(mut self, status: ShipmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, shipment: &Shipment) -> bool {
        shipment.driver_id == self.driver_id
            && self.status.is_none_or(|status| shipment.status == status)
    }
}

/// Emitted for every write to the shipments collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentChange {
    pub shipment_id: String,
    /// Assigned driver before and after the write, deduplicated.
    pub drivers: Vec<String>,
}

impl ShipmentChange {
    pub fn touches(&self, driver_id: &str) -> bool {
        self.drivers.iter().any(|driver| driver == driver_id)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_driver(&self, profile: DriverProfile) -> PlatformResult<()>;

    async fn get_driver(&self, driver_id: &str) -> PlatformResult<Option<DriverProfile>>;

    async fn update_driver(
        &self,
        driver_id: &str,
        update: DriverUpdate,
    ) -> PlatformResult<DriverProfile>;

    async fn get_shipment(&self, shipment_id: &str) -> PlatformResult<Option<Shipment>>;

    async fn query_shipments(&self, query: &ShipmentQuery) -> PlatformResult<Vec<Shipment>>;

    async fn update_shipment(
        &self,
        shipment_id: &str,
        update: ShipmentUpdate,
    ) -> PlatformResult<Shipment>;

    /// Appends atomically; existing entries are never touched.
    async fn append_proof(&self, shipment_id: &str, proof: NewProof) -> PlatformResult<Shipment>;

    fn shipment_changes(&self) -> broadcast::Receiver<ShipmentChange>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write-once: an existing path is a conflict.
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> PlatformResult<()>;

    async fn download_url(&self, path: &str) -> PlatformResult<String>;

    async fn read(&self, path: &str) -> PlatformResult<StoredBlob>;

    async fn delete(&self, path: &str) -> PlatformResult<()>;
}

#[async_trait]
pub trait PushMessaging: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn request_permission(&self) -> PlatformResult<Permission>;

    async fn get_token(&self) -> PlatformResult<String>;

    /// Foreground message feed, `None` when messaging is unsupported.
    fn messages(&self) -> Option<broadcast::Receiver<PushMessage>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub maximum_age: Duration,
    pub timeout: Duration,
    /// Minimum movement in meters before a watch emits again.
    pub distance_filter_m: f64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::from_secs(30),
            timeout: Duration::from_secs(27),
            distance_filter_m: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub coords: GeoPoint,
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

pub type PositionStream = Pin<Box<dyn Stream<Item = PlatformResult<Position>> + Send>>;

#[async_trait]
pub trait PositionSource: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn current_position(&self, options: &PositionOptions) -> PlatformResult<Position>;

    fn watch(&self, options: &PositionOptions) -> PlatformResult<PositionStream>;
}

/// Handle bundle shared by every service.
#[derive(Clone)]
pub struct Platform {
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub messaging: Arc<dyn PushMessaging>,
    pub positions: Arc<dyn PositionSource>,
}
