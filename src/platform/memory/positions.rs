use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use crate::geo::haversine_m;
use crate::models::driver::GeoPoint;
use crate::platform::{
    PlatformError, PlatformResult, Position, PositionOptions, PositionSource, PositionStream,
};

/// Position source fed by the device. The dashboard page forwards its
/// geolocation samples to the console, which publishes them here.
pub struct DevicePositionFeed {
    supported: bool,
    latest: watch::Sender<Option<Position>>,
    denied: Arc<AtomicBool>,
}

impl DevicePositionFeed {
    pub fn new(supported: bool) -> Self {
        let (latest, _unused_rx) = watch::channel(None);
        Self {
            supported,
            latest,
            denied: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn publish(&self, position: Position) {
        self.latest.send_replace(Some(position));
    }

    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn latest(&self) -> Option<Position> {
        self.latest.borrow().clone()
    }
}

struct WatchState {
    rx: watch::Receiver<Option<Position>>,
    denied: Arc<AtomicBool>,
    last: Option<GeoPoint>,
    primed: bool,
}

#[async_trait]
impl PositionSource for DevicePositionFeed {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn current_position(&self, options: &PositionOptions) -> PlatformResult<Position> {
        if !self.supported {
            return Err(PlatformError::Unsupported("geolocation".to_string()));
        }
        if self.denied.load(Ordering::SeqCst) {
            return Err(PlatformError::PermissionDenied);
        }

        let mut rx = self.latest.subscribe();
        let cached = rx.borrow_and_update().clone();
        if let Some(position) = cached.filter(|p| is_fresh(p, options.maximum_age)) {
            return Ok(position);
        }

        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(PlatformError::Unavailable("position feed closed".to_string()));
                }
                let next = rx.borrow_and_update().clone();
                if let Some(position) = next {
                    return Ok(position);
                }
            }
        };

        tokio::time::timeout(options.timeout, wait)
            .await
            .map_err(|_| PlatformError::Timeout)?
    }

    fn watch(&self, options: &PositionOptions) -> PlatformResult<PositionStream> {
        if !self.supported {
            return Err(PlatformError::Unsupported("geolocation".to_string()));
        }

        let distance_filter_m = options.distance_filter_m;
        let maximum_age = options.maximum_age;
        let state = WatchState {
            rx: self.latest.subscribe(),
            denied: self.denied.clone(),
            last: None,
            primed: false,
        };

        let stream = futures::stream::unfold(state, move |mut state| async move {
            loop {
                let first = !state.primed;
                if state.primed {
                    if state.rx.changed().await.is_err() {
                        return None;
                    }
                } else {
                    state.primed = true;
                }

                let next = state.rx.borrow_and_update().clone();
                let Some(position) = next else {
                    continue;
                };
                if first && !is_fresh(&position, maximum_age) {
                    continue;
                }
                if state.denied.load(Ordering::SeqCst) {
                    return Some((Err(PlatformError::PermissionDenied), state));
                }
                if let Some(last) = &state.last {
                    if haversine_m(last, &position.coords) < distance_filter_m {
                        continue;
                    }
                }

                state.last = Some(position.coords.clone());
                return Some((Ok(position), state));
            }
        });

        Ok(Box::pin(stream))
    }
}

fn is_fresh(position: &Position, maximum_age: Duration) -> bool {
    match (Utc::now() - position.timestamp).to_std() {
        Ok(age) => age <= maximum_age,
        // Timestamped slightly in the future by the device clock.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use futures::StreamExt;

    use super::DevicePositionFeed;
    use crate::models::driver::GeoPoint;
    use crate::platform::{PlatformError, Position, PositionOptions, PositionSource};

    fn position(latitude: f64, longitude: f64) -> Position {
        Position {
            coords: GeoPoint {
                latitude,
                longitude,
            },
            accuracy_m: Some(5.0),
            timestamp: Utc::now(),
        }
    }

    fn quick_options() -> PositionOptions {
        PositionOptions {
            timeout: Duration::from_millis(50),
            ..PositionOptions::default()
        }
    }

    #[tokio::test]
    async fn unsupported_device_reports_capability_error() {
        let feed = DevicePositionFeed::new(false);
        assert!(matches!(
            feed.current_position(&quick_options()).await,
            Err(PlatformError::Unsupported(_))
        ));
        assert!(feed.watch(&quick_options()).is_err());
    }

    #[tokio::test]
    async fn current_position_times_out_without_a_fix() {
        let feed = DevicePositionFeed::new(true);
        assert_eq!(
            feed.current_position(&quick_options()).await,
            Err(PlatformError::Timeout)
        );
    }

    #[tokio::test]
    async fn current_position_uses_fresh_cached_fix() {
        let feed = DevicePositionFeed::new(true);
        feed.publish(position(52.52, 13.405));
        let fix = feed.current_position(&quick_options()).await.unwrap();
        assert_eq!(fix.coords.latitude, 52.52);
    }

    #[tokio::test]
    async fn denied_permission_is_reported() {
        let feed = DevicePositionFeed::new(true);
        feed.set_denied(true);
        assert_eq!(
            feed.current_position(&quick_options()).await,
            Err(PlatformError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn watch_skips_moves_below_distance_filter() {
        let feed = DevicePositionFeed::new(true);
        let mut stream = feed.watch(&PositionOptions::default()).unwrap();

        feed.publish(position(52.52, 13.405));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.coords.latitude, 52.52);

        // ~5 m north, filtered out.
        feed.publish(position(52.52005, 13.405));
        tokio::task::yield_now().await;
        // ~110 m north.
        feed.publish(position(52.521, 13.405));

        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(next.coords.latitude, 52.521);
    }
}
