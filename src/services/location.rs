use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, PositionError};
use crate::platform::{PlatformError, Position, PositionOptions, PositionSource};
use crate::services::shipments::ShipmentRepository;

/// Owned handle to a running location watch. Pass it back to
/// [`LocationReporter::stop_tracking`] to end the watch.
#[derive(Debug)]
pub struct WatchHandle {
    id: Uuid,
    driver_id: String,
    token: CancellationToken,
}

impl WatchHandle {
    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    /// False once stopped or superseded by a newer watch.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

struct ActiveWatch {
    id: Uuid,
    token: CancellationToken,
}

/// Streams device positions onto the driver's profile. At most one watch
/// runs per reporter.
pub struct LocationReporter {
    positions: Arc<dyn PositionSource>,
    repository: ShipmentRepository,
    options: PositionOptions,
    active: Mutex<Option<ActiveWatch>>,
}

impl LocationReporter {
    pub fn new(positions: Arc<dyn PositionSource>, repository: ShipmentRepository) -> Self {
        Self::with_options(positions, repository, PositionOptions::default())
    }

    pub fn with_options(
        positions: Arc<dyn PositionSource>,
        repository: ShipmentRepository,
        options: PositionOptions,
    ) -> Self {
        Self {
            positions,
            repository,
            options,
            active: Mutex::new(None),
        }
    }

    /// Starts reporting positions for `driver_id`. A watch that is already
    /// running is stopped first.
    pub fn start_tracking(&self, driver_id: &str) -> Result<WatchHandle, AppError> {
        if !self.positions.is_supported() {
            warn!("geolocation is not supported on this device");
            return Err(AppError::Capability("geolocation".to_string()));
        }

        let mut stream = self.positions.watch(&self.options).map_err(|err| {
            warn!(error = %err, "failed to open position watch");
            position_error(err)
        })?;

        let token = CancellationToken::new();
        let id = Uuid::new_v4();

        {
            let mut active = self.lock_active();
            if let Some(previous) = active.replace(ActiveWatch {
                id,
                token: token.clone(),
            }) {
                debug!(watch_id = %previous.id, "replacing running location watch");
                previous.token.cancel();
            }
        }

        let repository = self.repository.clone();
        let owner = driver_id.to_string();
        let watch_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watch_token.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(position)) => report(&repository, &owner, position),
                        Some(Err(err)) => warn!(driver_id = %owner, error = %err, "position error"),
                        None => {
                            warn!(driver_id = %owner, "position feed ended");
                            break;
                        }
                    }
                }
            }
            debug!(watch_id = %id, "location watch finished");
        });

        info!(driver_id, watch_id = %id, "location tracking started");
        Ok(WatchHandle {
            id,
            driver_id: driver_id.to_string(),
            token,
        })
    }

    /// Returns whether `handle` was the running watch and has now been
    /// cancelled. Stopping a stopped or superseded watch returns false.
    pub fn stop_tracking(&self, handle: &WatchHandle) -> bool {
        let stopped = {
            let mut active = self.lock_active();
            match active.as_ref() {
                Some(current) if current.id == handle.id => active.take(),
                _ => None,
            }
        };
        handle.token.cancel();

        match stopped {
            Some(watch) => {
                watch.token.cancel();
                info!(driver_id = %handle.driver_id, watch_id = %watch.id, "location tracking stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|watch| !watch.token.is_cancelled())
    }

    pub async fn get_current_position(&self) -> Result<Position, AppError> {
        self.positions
            .current_position(&self.options)
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to read current position");
                position_error(err)
            })
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveWatch>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for LocationReporter {
    fn drop(&mut self) {
        if let Some(watch) = self.lock_active().take() {
            watch.token.cancel();
        }
    }
}

/// Fire-and-forget: overlapping writes complete in whatever order the store
/// finishes them.
fn report(repository: &ShipmentRepository, driver_id: &str, position: Position) {
    let repository = repository.clone();
    let driver_id = driver_id.to_string();
    tokio::spawn(async move {
        match repository
            .update_driver_location(&driver_id, position.coords)
            .await
        {
            Ok(_) => debug!(driver_id = %driver_id, "location updated"),
            Err(err) => warn!(driver_id = %driver_id, error = %err, "location update failed"),
        }
    });
}

fn position_error(err: PlatformError) -> AppError {
    match err {
        PlatformError::Unsupported(what) => AppError::Capability(what),
        PlatformError::PermissionDenied => PositionError::PermissionDenied.into(),
        PlatformError::Timeout => PositionError::Timeout.into(),
        other => PositionError::Unavailable(other.to_string()).into(),
    }
}
