use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::driver::DriverProfile;
use crate::models::shipment::{Destination, Shipment, ShipmentStatus};
use crate::platform::DocumentStore;

use super::MemoryPlatform;

/// Fixture loaded at startup: driver accounts and the shipments assigned to
/// them. Shipments reference their driver by email.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub drivers: Vec<SeedDriver>,
    #[serde(default)]
    pub shipments: Vec<SeedShipment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedDriver {
    pub email: String,
    pub password: String,
    pub name: String,
    pub vehicle: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedShipment {
    pub id: String,
    pub driver_email: String,
    #[serde(default)]
    pub status: Option<ShipmentStatus>,
    pub customer: String,
    pub destination: Option<Destination>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub drivers: usize,
    pub shipments: usize,
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::Internal(format!("failed to read seed file {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|err| AppError::Internal(format!("invalid seed file: {err}")))
    }
}

impl MemoryPlatform {
    /// Provisions seeded drivers and assigns their shipments. Shipments whose
    /// driver is unknown are skipped.
    pub async fn seed(&self, data: &SeedData) -> Result<SeedSummary, AppError> {
        let mut uids = HashMap::new();

        for driver in &data.drivers {
            let session = self
                .identity
                .provision(&driver.email, &driver.password, &driver.name)
                .map_err(|err| {
                    AppError::Internal(format!("failed to seed driver {}: {err}", driver.email))
                })?;

            let mut profile = DriverProfile::new(
                session.uid.clone(),
                driver.name.trim(),
                session.email.clone(),
            );
            profile.vehicle = driver.vehicle.clone();
            self.documents
                .create_driver(profile)
                .await
                .map_err(|err| AppError::Internal(format!("failed to seed profile: {err}")))?;

            uids.insert(driver.email.trim().to_lowercase(), session.uid);
        }

        let mut shipments = 0;
        for seeded in &data.shipments {
            let Some(driver_id) = uids.get(&seeded.driver_email.trim().to_lowercase()) else {
                warn!(shipment_id = %seeded.id, driver_email = %seeded.driver_email, "seed shipment has no matching driver");
                continue;
            };

            let status = seeded.status.unwrap_or(ShipmentStatus::Pending);
            let created_at = seeded.created_at.unwrap_or_else(Utc::now);
            self.documents.upsert_shipment(Shipment {
                id: seeded.id.clone(),
                driver_id: driver_id.clone(),
                status,
                customer: seeded.customer.clone(),
                destination: seeded.destination.clone(),
                address: seeded.address.clone(),
                delivery_proofs: Vec::new(),
                status_history: BTreeMap::from([(status, created_at)]),
                status_updated_at: None,
                notes: seeded.notes.clone(),
                created_at,
            });
            shipments += 1;
        }

        let summary = SeedSummary {
            drivers: uids.len(),
            shipments,
        };
        info!(drivers = summary.drivers, shipments = summary.shipments, "seed data loaded");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::SeedData;
    use crate::models::shipment::ShipmentStatus;
    use crate::platform::memory::{MemoryOptions, MemoryPlatform};
    use crate::platform::{DocumentStore, IdentityProvider, ShipmentQuery};

    const SEED: &str = r#"{
        "drivers": [
            {"email": "ana@example.com", "password": "secret-1", "name": "Ana", "vehicle": "Van 3"}
        ],
        "shipments": [
            {"id": "S1", "driver_email": "ANA@example.com", "customer": "Acme", "address": "1 Dock Rd"},
            {"id": "S2", "driver_email": "ana@example.com", "status": "in_transit", "customer": "Globex",
             "destination": {"address": "5 Pier St", "coordinates": {"latitude": 40.7, "longitude": -74.0}}},
            {"id": "S3", "driver_email": "ghost@example.com", "customer": "Nobody"}
        ]
    }"#;

    #[tokio::test]
    async fn seeds_drivers_and_their_shipments() {
        let memory = MemoryPlatform::new(&MemoryOptions::default());
        let summary = memory.seed(&SeedData::from_json(SEED).unwrap()).await.unwrap();
        assert_eq!(summary.drivers, 1);
        assert_eq!(summary.shipments, 2);

        let session = memory
            .identity
            .sign_in("ana@example.com", "secret-1")
            .await
            .unwrap();
        let profile = memory.documents.get_driver(&session.uid).await.unwrap().unwrap();
        assert_eq!(profile.vehicle.as_deref(), Some("Van 3"));

        let shipments = memory
            .documents
            .query_shipments(&ShipmentQuery::for_driver(&session.uid))
            .await
            .unwrap();
        assert_eq!(shipments.len(), 2);
        let s2 = shipments.iter().find(|s| s.id == "S2").unwrap();
        assert_eq!(s2.status, ShipmentStatus::InTransit);
        assert!(s2.destination_coordinates().is_some());
    }

    #[test]
    fn malformed_seed_is_rejected() {
        assert!(SeedData::from_json("{\"drivers\": 3}").is_err());
    }
}
