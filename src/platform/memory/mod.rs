//! In-process implementations of the platform contracts.

mod blobs;
mod documents;
mod identity;
mod messaging;
mod positions;
mod seed;

use std::sync::Arc;

pub use blobs::MemoryBlobStore;
pub use documents::MemoryDocumentStore;
pub use identity::MemoryIdentity;
pub use messaging::MemoryMessaging;
pub use positions::DevicePositionFeed;
pub use seed::{SeedData, SeedDriver, SeedShipment, SeedSummary};

#[cfg(test)]
pub(crate) use documents::tests::shipment as test_shipment;

use crate::models::notification::Permission;
use crate::platform::Platform;

#[derive(Debug, Clone)]
pub struct MemoryOptions {
    pub public_base_url: String,
    pub event_buffer_size: usize,
    pub geolocation_enabled: bool,
    pub messaging_enabled: bool,
    pub notification_permission: Permission,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            event_buffer_size: 1024,
            geolocation_enabled: true,
            messaging_enabled: true,
            notification_permission: Permission::Granted,
        }
    }
}

/// Concrete handles kept alongside the trait-object bundle so tests and the
/// device bridge can reach implementation-specific controls.
#[derive(Clone)]
pub struct MemoryPlatform {
    pub identity: Arc<MemoryIdentity>,
    pub documents: Arc<MemoryDocumentStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub messaging: Arc<MemoryMessaging>,
    pub positions: Arc<DevicePositionFeed>,
}

impl MemoryPlatform {
    pub fn new(options: &MemoryOptions) -> Self {
        Self {
            identity: Arc::new(MemoryIdentity::new()),
            documents: Arc::new(MemoryDocumentStore::new(options.event_buffer_size)),
            blobs: Arc::new(MemoryBlobStore::new(options.public_base_url.clone())),
            messaging: Arc::new(MemoryMessaging::new(
                options.messaging_enabled,
                options.notification_permission,
                options.event_buffer_size,
            )),
            positions: Arc::new(DevicePositionFeed::new(options.geolocation_enabled)),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            identity: self.identity.clone(),
            documents: self.documents.clone(),
            blobs: self.blobs.clone(),
            messaging: self.messaging.clone(),
            positions: self.positions.clone(),
        }
    }
}
