use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::models::driver::DriverProfile;
use crate::models::shipment::{DeliveryProof, Shipment};
use crate::platform::{
    DocumentStore, DriverUpdate, NewProof, PlatformError, PlatformResult, ShipmentChange,
    ShipmentQuery, ShipmentUpdate,
};

/// `drivers` and `shipments` collections held in process memory.
pub struct MemoryDocumentStore {
    drivers: DashMap<String, DriverProfile>,
    shipments: DashMap<String, Shipment>,
    changes_tx: broadcast::Sender<ShipmentChange>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        Self {
            drivers: DashMap::new(),
            shipments: DashMap::new(),
            changes_tx,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates losing the connection to the database.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Inserts or replaces a shipment. Shipments are created by dispatch,
    /// outside the driver console.
    pub fn upsert_shipment(&self, shipment: Shipment) {
        let id = shipment.id.clone();
        let new_driver = shipment.driver_id.clone();
        let previous = self.shipments.insert(id.clone(), shipment);
        let old_driver = previous.map(|previous| previous.driver_id);
        self.notify(id, old_driver, Some(new_driver));
    }

    pub fn remove_shipment(&self, shipment_id: &str) -> Option<Shipment> {
        let (_, removed) = self.shipments.remove(shipment_id)?;
        self.notify(removed.id.clone(), Some(removed.driver_id.clone()), None);
        Some(removed)
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    fn ensure_online(&self) -> PlatformResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("document store offline".to_string()));
        }
        Ok(())
    }

    fn notify(&self, shipment_id: String, before: Option<String>, after: Option<String>) {
        let mut drivers: Vec<String> = before.into_iter().chain(after).collect();
        drivers.dedup();
        let _ = self.changes_tx.send(ShipmentChange {
            shipment_id,
            drivers,
        });
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_driver(&self, profile: DriverProfile) -> PlatformResult<()> {
        self.ensure_online()?;
        self.drivers.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn get_driver(&self, driver_id: &str) -> PlatformResult<Option<DriverProfile>> {
        self.ensure_online()?;
        Ok(self
            .drivers
            .get(driver_id)
            .map(|entry| entry.value().clone()))
    }

    async fn update_driver(
        &self,
        driver_id: &str,
        update: DriverUpdate,
    ) -> PlatformResult<DriverProfile> {
        self.ensure_online()?;

        let mut driver = self
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| PlatformError::NotFound(format!("drivers/{driver_id}")))?;

        let now = Utc::now();
        match update {
            DriverUpdate::Profile(patch) => {
                if let Some(name) = patch.name {
                    driver.name = name;
                }
                if let Some(status) = patch.status {
                    driver.status = status;
                }
                if let Some(vehicle) = patch.vehicle {
                    driver.vehicle = Some(vehicle);
                }
                driver.updated_at = now;
            }
            DriverUpdate::Location(location) => {
                driver.location = Some(location);
                driver.last_location_update = Some(now);
            }
            DriverUpdate::AddPushToken(token) => {
                driver.push_tokens.insert(token);
                driver.token_updated_at = Some(now);
            }
        }

        Ok(driver.clone())
    }

    async fn get_shipment(&self, shipment_id: &str) -> PlatformResult<Option<Shipment>> {
        self.ensure_online()?;
        Ok(self
            .shipments
            .get(shipment_id)
            .map(|entry| entry.value().clone()))
    }

    async fn query_shipments(&self, query: &ShipmentQuery) -> PlatformResult<Vec<Shipment>> {
        self.ensure_online()?;

        let mut matches: Vec<Shipment> = self
            .shipments
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }

        Ok(matches)
    }

    async fn update_shipment(
        &self,
        shipment_id: &str,
        update: ShipmentUpdate,
    ) -> PlatformResult<Shipment> {
        self.ensure_online()?;

        let updated = match self.shipments.entry(shipment_id.to_string()) {
            Entry::Vacant(_) => {
                return Err(PlatformError::NotFound(format!("shipments/{shipment_id}")));
            }
            Entry::Occupied(mut occupied) => {
                let shipment = occupied.get_mut();
                match update {
                    ShipmentUpdate::Status {
                        expected,
                        status,
                        notes,
                    } => {
                        if shipment.status != expected {
                            return Err(PlatformError::Conflict(format!(
                                "shipments/{shipment_id} is {}, expected {expected}",
                                shipment.status
                            )));
                        }
                        let now = Utc::now();
                        shipment.status = status;
                        shipment.status_history.insert(status, now);
                        shipment.status_updated_at = Some(now);
                        if notes.is_some() {
                            shipment.notes = notes;
                        }
                    }
                }
                shipment.clone()
            }
        };

        self.notify(
            updated.id.clone(),
            Some(updated.driver_id.clone()),
            None,
        );
        Ok(updated)
    }

    async fn append_proof(&self, shipment_id: &str, proof: NewProof) -> PlatformResult<Shipment> {
        self.ensure_online()?;

        let updated = {
            let mut shipment = self
                .shipments
                .get_mut(shipment_id)
                .ok_or_else(|| PlatformError::NotFound(format!("shipments/{shipment_id}")))?;
            shipment.delivery_proofs.push(DeliveryProof {
                url: proof.url,
                file_name: proof.file_name,
                uploaded_at: Utc::now(),
            });
            shipment.clone()
        };

        self.notify(
            updated.id.clone(),
            Some(updated.driver_id.clone()),
            None,
        );
        Ok(updated)
    }

    fn shipment_changes(&self) -> broadcast::Receiver<ShipmentChange> {
        self.changes_tx.subscribe()
    }
}
