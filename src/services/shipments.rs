use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::driver::{DriverPatch, DriverProfile, GeoPoint};
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::observability::metrics::{outcome, Metrics};
use crate::platform::{
    DocumentStore, DriverUpdate, PlatformError, ShipmentQuery, ShipmentUpdate,
};
use crate::services::subscription::Subscription;

/// Reads and writes the `shipments` and `drivers` collections.
#[derive(Clone)]
pub struct ShipmentRepository {
    documents: Arc<dyn DocumentStore>,
    metrics: Metrics,
}

impl ShipmentRepository {
    pub fn new(documents: Arc<dyn DocumentStore>, metrics: Metrics) -> Self {
        Self { documents, metrics }
    }

    pub async fn list_for_driver(&self, driver_id: &str) -> Result<Vec<Shipment>, AppError> {
        self.documents
            .query_shipments(&ShipmentQuery::for_driver(driver_id))
            .await
            .map_err(|err| {
                error!(driver_id, error = %err, "failed to list shipments");
                store_error(err)
            })
    }

    pub async fn get(&self, shipment_id: &str) -> Result<Shipment, AppError> {
        self.documents
            .get_shipment(shipment_id)
            .await
            .map_err(|err| {
                error!(shipment_id, error = %err, "failed to read shipment");
                store_error(err)
            })?
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))
    }

    /// Live view of a driver's shipments, newest first. `callback` receives the
    /// whole result set on attach and after every change touching the driver.
    pub fn subscribe<F>(&self, driver_id: &str, callback: F) -> Subscription
    where
        F: Fn(Vec<Shipment>) + Send + Sync + 'static,
    {
        let documents = self.documents.clone();
        let query = ShipmentQuery::for_driver(driver_id);
        // Attach before the first read so no write slips between the two.
        let mut changes = documents.shipment_changes();

        Subscription::spawn(&self.metrics, move |token| async move {
            push_snapshot(documents.as_ref(), &query, &callback).await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) if !change.touches(&query.driver_id) => continue,
                        Ok(change) => {
                            debug!(shipment_id = %change.shipment_id, "shipment changed");
                            push_snapshot(documents.as_ref(), &query, &callback).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "shipment feed lagged; resyncing");
                            push_snapshot(documents.as_ref(), &query, &callback).await;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        })
    }

    /// Moves a shipment one step along pending → in_transit → delivered.
    pub async fn update_status(
        &self,
        shipment_id: &str,
        new_status: ShipmentStatus,
        notes: Option<String>,
    ) -> Result<Shipment, AppError> {
        let result = self.apply_status(shipment_id, new_status, notes).await;
        self.metrics
            .status_updates_total
            .with_label_values(&[outcome(&result)])
            .inc();
        result
    }

    async fn apply_status(
        &self,
        shipment_id: &str,
        new_status: ShipmentStatus,
        notes: Option<String>,
    ) -> Result<Shipment, AppError> {
        let current = self.get(shipment_id).await?;
        if !current.status.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        let notes = notes.filter(|notes| !notes.trim().is_empty());
        let update = ShipmentUpdate::Status {
            expected: current.status,
            status: new_status,
            notes,
        };

        match self.documents.update_shipment(shipment_id, update).await {
            Ok(updated) => {
                info!(shipment_id, status = %new_status, "shipment status updated");
                Ok(updated)
            }
            Err(PlatformError::Conflict(reason)) => {
                warn!(shipment_id, %reason, "status changed underneath the update");
                let latest = self.get(shipment_id).await?;
                Err(AppError::InvalidTransition {
                    from: latest.status,
                    to: new_status,
                })
            }
            Err(err) => {
                error!(shipment_id, error = %err, "failed to update shipment status");
                Err(store_error(err))
            }
        }
    }

    /// First `in_transit` shipment of the driver, if any.
    pub async fn get_active(&self, driver_id: &str) -> Result<Option<Shipment>, AppError> {
        let query = ShipmentQuery::for_driver(driver_id)
            .with_status(ShipmentStatus::InTransit)
            .with_limit(1);

        let mut found = self.documents.query_shipments(&query).await.map_err(|err| {
            error!(driver_id, error = %err, "failed to read active shipment");
            store_error(err)
        })?;
        Ok(found.pop())
    }

    pub async fn get_driver_profile(
        &self,
        driver_id: &str,
    ) -> Result<Option<DriverProfile>, AppError> {
        self.documents.get_driver(driver_id).await.map_err(|err| {
            error!(driver_id, error = %err, "failed to read driver profile");
            store_error(err)
        })
    }

    pub async fn update_driver_profile(
        &self,
        driver_id: &str,
        patch: DriverPatch,
    ) -> Result<DriverProfile, AppError> {
        if patch.is_empty() {
            return Err(AppError::BadRequest("nothing to update".to_string()));
        }
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }

        self.documents
            .update_driver(driver_id, DriverUpdate::Profile(patch))
            .await
            .map_err(|err| {
                error!(driver_id, error = %err, "failed to update driver profile");
                store_error(err)
            })
    }

    pub async fn update_driver_location(
        &self,
        driver_id: &str,
        location: GeoPoint,
    ) -> Result<DriverProfile, AppError> {
        let result = self
            .documents
            .update_driver(driver_id, DriverUpdate::Location(location))
            .await
            .map_err(|err| {
                error!(driver_id, error = %err, "failed to update driver location");
                store_error(err)
            });
        self.metrics
            .location_reports_total
            .with_label_values(&[outcome(&result)])
            .inc();
        result
    }
}

async fn push_snapshot<F>(documents: &dyn DocumentStore, query: &ShipmentQuery, callback: &F)
where
    F: Fn(Vec<Shipment>),
{
    match documents.query_shipments(query).await {
        Ok(shipments) => callback(shipments),
        Err(err) => {
            warn!(driver_id = %query.driver_id, error = %err, "shipment snapshot failed");
        }
    }
}

pub(crate) fn store_error(err: PlatformError) -> AppError {
    match err {
        PlatformError::NotFound(what) => AppError::NotFound(what),
        other => AppError::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::ShipmentRepository;
    use crate::error::AppError;
    use crate::models::driver::{DriverProfile, GeoPoint};
    use crate::models::shipment::{Shipment, ShipmentStatus};
    use crate::observability::metrics::Metrics;
    use crate::platform::memory::{test_shipment, MemoryDocumentStore};
    use crate::platform::DocumentStore;

    fn repository() -> (ShipmentRepository, Arc<MemoryDocumentStore>) {
        let documents = Arc::new(MemoryDocumentStore::new(64));
        (
            ShipmentRepository::new(documents.clone(), Metrics::new()),
            documents,
        )
    }

    async fn next_snapshot(rx: &mut mpsc::UnboundedReceiver<Vec<Shipment>>) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect()
    }

    #[tokio::test]
    async fn delivered_update_stamps_history() {
        let (repo, documents) = repository();
        documents.upsert_shipment(test_shipment("s1", "d1", ShipmentStatus::InTransit, 5));

        let before = Utc::now();
        repo.update_status("s1", ShipmentStatus::Delivered, Some("left at door".into()))
            .await
            .unwrap();

        let stored = repo.get("s1").await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::Delivered);
        assert!(stored.status_history[&ShipmentStatus::Delivered] >= before);
        assert_eq!(stored.latest_history_status(), Some(ShipmentStatus::Delivered));
        assert_eq!(stored.notes.as_deref(), Some("left at door"));
    }

    #[tokio::test]
    async fn skipping_a_step_is_rejected_without_writing() {
        let (repo, documents) = repository();
        documents.upsert_shipment(test_shipment("s1", "d1", ShipmentStatus::Pending, 5));

        let err = repo
            .update_status("s1", ShipmentStatus::Delivered, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: ShipmentStatus::Pending,
                to: ShipmentStatus::Delivered
            }
        ));

        let stored = repo.get("s1").await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::Pending);
        assert!(stored.status_history.is_empty());
    }

    #[tokio::test]
    async fn missing_shipment_is_not_found() {
        let (repo, _documents) = repository();
        let err = repo
            .update_status("nope", ShipmentStatus::InTransit, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_active_returns_in_transit_shipment() {
        let (repo, documents) = repository();
        assert!(repo.get_active("d1").await.unwrap().is_none());

        documents.upsert_shipment(test_shipment("s1", "d1", ShipmentStatus::Pending, 5));
        documents.upsert_shipment(test_shipment("s2", "d1", ShipmentStatus::InTransit, 3));
        documents.upsert_shipment(test_shipment("s3", "d2", ShipmentStatus::InTransit, 1));

        let active = repo.get_active("d1").await.unwrap().unwrap();
        assert_eq!(active.id, "s2");
    }

    #[tokio::test]
    async fn subscription_tracks_inserts_updates_and_reassignment() {
        let (repo, documents) = repository();
        documents.upsert_shipment(test_shipment("old", "d1", ShipmentStatus::Pending, 60));
        documents.upsert_shipment(test_shipment("foreign", "d2", ShipmentStatus::Pending, 1));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = repo.subscribe("d1", move |shipments| {
            let _ = tx.send(shipments);
        });

        assert_eq!(next_snapshot(&mut rx).await, vec!["old"]);

        documents.upsert_shipment(test_shipment("new", "d1", ShipmentStatus::Pending, 1));
        assert_eq!(next_snapshot(&mut rx).await, vec!["new", "old"]);

        repo.update_status("old", ShipmentStatus::InTransit, None)
            .await
            .unwrap();
        assert_eq!(next_snapshot(&mut rx).await, vec!["new", "old"]);

        documents.upsert_shipment(test_shipment("old", "d2", ShipmentStatus::InTransit, 60));
        assert_eq!(next_snapshot(&mut rx).await, vec!["new"]);

        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn location_write_overwrites_previous_fix() {
        let (repo, documents) = repository();
        documents
            .create_driver(DriverProfile::new("d1", "Dee", "dee@example.com"))
            .await
            .unwrap();

        for latitude in [52.0, 53.0] {
            repo.update_driver_location(
                "d1",
                GeoPoint {
                    latitude,
                    longitude: 13.0,
                },
            )
            .await
            .unwrap();
        }

        let profile = repo.get_driver_profile("d1").await.unwrap().unwrap();
        assert_eq!(profile.location.unwrap().latitude, 53.0);
        assert!(profile.last_location_update.is_some());
    }
}
