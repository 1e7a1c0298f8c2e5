use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{DriverPatch, GeoPoint};
use crate::models::notification::PushMessage;
use crate::models::session::Session;
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::observability::metrics::Metrics;
use crate::platform::{Platform, Position};
use crate::presentation::board::ShipmentBoard;
use crate::presentation::map::{location_label, MapView};
use crate::presentation::profile::ProfileView;
use crate::presentation::toast::{Toast, ToastVariant, Toasts};
use crate::services::location::{LocationReporter, WatchHandle};
use crate::services::notifications::NotificationRegistrar;
use crate::services::proofs::{ProofUploader, UploadedProof};
use crate::services::session::SessionGateway;
use crate::services::shipments::ShipmentRepository;
use crate::services::subscription::Subscription;

const MESSAGE_HISTORY: usize = 20;

/// Pushed to live clients whenever visible state changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    Session { session: Option<Session> },
    Shipments { board: ShipmentBoard },
    Message { message: PushMessage },
    Toast { toast: Toast },
    Tracking { tracking: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub session: Option<Session>,
    pub session_loading: bool,
    pub shipments_loading: bool,
    pub board: ShipmentBoard,
    pub tracking: bool,
    pub current_location: Option<GeoPoint>,
    pub location_label: String,
    pub messages: Vec<PushMessage>,
    pub toasts: Vec<Toast>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub proof: UploadedProof,
    pub shipment: Shipment,
}

struct UiState {
    session: Option<Session>,
    session_loading: bool,
    shipments: Vec<Shipment>,
    shipments_loading: bool,
    tracking: Option<WatchHandle>,
    current_location: Option<GeoPoint>,
    map_loading: bool,
    uploading: BTreeSet<String>,
    messages: VecDeque<PushMessage>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            session: None,
            session_loading: true,
            shipments: Vec::new(),
            shipments_loading: false,
            tracking: None,
            current_location: None,
            map_loading: false,
            uploading: BTreeSet::new(),
            messages: VecDeque::with_capacity(MESSAGE_HISTORY),
        }
    }
}

#[derive(Default)]
struct Feeds {
    session: Option<Subscription>,
    messages: Option<Subscription>,
    shipments: Option<Subscription>,
}

/// The driver console. Owns the services, keeps the visible state and turns
/// every service failure into a toast.
pub struct Dashboard {
    me: Weak<Dashboard>,
    session: SessionGateway,
    shipments: ShipmentRepository,
    reporter: LocationReporter,
    proofs: ProofUploader,
    notifications: NotificationRegistrar,
    toasts: Toasts,
    ui: Mutex<UiState>,
    feeds: Mutex<Feeds>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Dashboard {
    pub fn new(platform: &Platform, metrics: Metrics, event_buffer_size: usize) -> Arc<Self> {
        let shipments = ShipmentRepository::new(platform.documents.clone(), metrics.clone());
        let (events, _) = broadcast::channel(event_buffer_size.max(1));

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            session: SessionGateway::new(
                platform.identity.clone(),
                platform.documents.clone(),
                metrics.clone(),
            ),
            reporter: LocationReporter::new(platform.positions.clone(), shipments.clone()),
            proofs: ProofUploader::new(
                platform.blobs.clone(),
                platform.documents.clone(),
                metrics.clone(),
            ),
            notifications: NotificationRegistrar::new(
                platform.messaging.clone(),
                platform.documents.clone(),
                metrics,
            ),
            shipments,
            toasts: Toasts::default(),
            ui: Mutex::new(UiState::default()),
            feeds: Mutex::new(Feeds::default()),
            events,
        })
    }

    /// Attaches the session observer and the foreground message listener.
    /// Calling it again is a no-op while the feeds are running.
    pub fn start(&self) {
        let mut feeds = self.lock_feeds();
        if feeds.session.is_none() {
            let me = self.me.clone();
            feeds.session = Some(self.session.observe_session(move |session| {
                if let Some(dashboard) = me.upgrade() {
                    dashboard.on_session(session);
                }
            }));
        }
        if feeds.messages.is_none() {
            let me = self.me.clone();
            feeds.messages = Some(self.notifications.on_message(move |message| {
                if let Some(dashboard) = me.upgrade() {
                    dashboard.on_message(message);
                }
            }));
        }
        debug!("dashboard feeds attached");
    }

    /// Tears down every live feed and the running location watch.
    pub fn shutdown(&self) {
        let feeds = std::mem::take(&mut *self.lock_feeds());
        drop(feeds);

        let handle = self.lock_ui().tracking.take();
        if let Some(handle) = handle {
            self.reporter.stop_tracking(&handle);
        }
        info!("dashboard shut down");
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let ui = self.lock_ui();
        let uploading: Vec<String> = ui.uploading.iter().cloned().collect();
        DashboardSnapshot {
            session: ui.session.clone(),
            session_loading: ui.session_loading,
            shipments_loading: ui.shipments_loading,
            board: ShipmentBoard::group(&ui.shipments, &uploading),
            tracking: ui.tracking.as_ref().is_some_and(WatchHandle::is_active),
            location_label: location_label(ui.current_location.as_ref()),
            current_location: ui.current_location.clone(),
            messages: ui.messages.iter().cloned().collect(),
            toasts: self.toasts.list(),
        }
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.list()
    }

    pub fn dismiss_toast(&self, id: Uuid) -> bool {
        self.toasts.dismiss(id)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.current_session()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        match self.session.sign_in(email, password).await {
            Ok(session) => Ok(session),
            Err(err) => self.fail(err),
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, AppError> {
        match self.session.sign_up(email, password, name).await {
            Ok(session) => {
                self.notify("Account created", format!("Welcome, {}", name.trim()));
                Ok(session)
            }
            Err(err) => self.fail(err),
        }
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        match self.session.sign_out().await {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err),
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        match self.session.send_password_reset(email).await {
            Ok(()) => {
                self.notify("Password reset sent", "Check your inbox for a reset link");
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    pub async fn list_shipments(&self) -> Result<Vec<Shipment>, AppError> {
        let session = self.require_session()?;
        match self.shipments.list_for_driver(&session.uid).await {
            Ok(shipments) => Ok(shipments),
            Err(err) => self.fail(err),
        }
    }

    pub async fn active_shipment(&self) -> Result<Option<Shipment>, AppError> {
        let session = self.require_session()?;
        match self.shipments.get_active(&session.uid).await {
            Ok(active) => Ok(active),
            Err(err) => self.fail(err),
        }
    }

    pub async fn update_status(
        &self,
        shipment_id: &str,
        status: ShipmentStatus,
        notes: Option<String>,
    ) -> Result<Shipment, AppError> {
        let session = self.require_session()?;
        let result = async {
            self.owned_shipment(&session, shipment_id).await?;
            self.shipments.update_status(shipment_id, status, notes).await
        }
        .await;

        match result {
            Ok(shipment) => {
                self.notify(
                    "Status updated",
                    format!(
                        "Shipment #{} is now {}",
                        shipment.id,
                        shipment.status.as_str().replace('_', " ")
                    ),
                );
                Ok(shipment)
            }
            Err(err) => self.fail(err),
        }
    }

    /// Uploads a delivery photo, then marks the shipment delivered.
    pub async fn upload_proof_and_deliver(
        &self,
        shipment_id: &str,
        bytes: Bytes,
        file_name: &str,
    ) -> Result<DeliveryOutcome, AppError> {
        let session = self.require_session()?;
        let shipment = match self.owned_shipment(&session, shipment_id).await {
            Ok(shipment) => shipment,
            Err(err) => return self.fail(err),
        };
        // Nothing is stored unless the shipment can still be delivered.
        if !shipment.status.can_transition_to(ShipmentStatus::Delivered) {
            return self.fail(AppError::InvalidTransition {
                from: shipment.status,
                to: ShipmentStatus::Delivered,
            });
        }

        self.lock_ui().uploading.insert(shipment_id.to_string());
        self.publish_board();

        let result = async {
            let proof = self.proofs.upload_proof(shipment_id, bytes, file_name).await?;
            let shipment = self
                .shipments
                .update_status(shipment_id, ShipmentStatus::Delivered, None)
                .await?;
            Ok::<_, AppError>(DeliveryOutcome { proof, shipment })
        }
        .await;

        self.lock_ui().uploading.remove(shipment_id);
        self.publish_board();

        match result {
            Ok(outcome) => {
                self.notify(
                    "Delivery completed",
                    format!("Proof uploaded for shipment #{shipment_id}"),
                );
                Ok(outcome)
            }
            Err(err) => self.fail(err),
        }
    }

    pub async fn profile_view(&self) -> Result<ProfileView, AppError> {
        let session = self.require_session()?;
        match self.shipments.get_driver_profile(&session.uid).await {
            Ok(profile) => Ok(ProfileView::build(&session, profile.as_ref())),
            Err(err) => self.fail(err),
        }
    }

    pub async fn update_profile(&self, patch: DriverPatch) -> Result<ProfileView, AppError> {
        let session = self.require_session()?;
        match self.shipments.update_driver_profile(&session.uid, patch).await {
            Ok(profile) => {
                self.notify("Profile updated", "Your details were saved");
                Ok(ProfileView::build(&session, Some(&profile)))
            }
            Err(err) => self.fail(err),
        }
    }

    pub fn start_tracking(&self) -> Result<bool, AppError> {
        let session = self.require_session()?;
        let handle = match self.reporter.start_tracking(&session.uid) {
            Ok(handle) => handle,
            Err(err) => return self.fail(err),
        };

        let previous = self.lock_ui().tracking.replace(handle);
        drop(previous);

        self.notify("Location tracking started", "Your location is being shared");
        self.emit(DashboardEvent::Tracking { tracking: true });
        Ok(true)
    }

    /// Returns false when nothing was running.
    pub fn stop_tracking(&self) -> bool {
        let Some(handle) = self.lock_ui().tracking.take() else {
            return false;
        };

        let stopped = self.reporter.stop_tracking(&handle);
        if stopped {
            self.notify("Location tracking stopped", "Your location is no longer shared");
        }
        self.emit(DashboardEvent::Tracking { tracking: false });
        stopped
    }

    /// Flips tracking and returns the new state.
    pub fn toggle_tracking(&self) -> Result<bool, AppError> {
        let running = self
            .lock_ui()
            .tracking
            .as_ref()
            .is_some_and(WatchHandle::is_active);

        if running {
            self.stop_tracking();
            Ok(false)
        } else {
            self.start_tracking()
        }
    }

    /// One-shot position read that also becomes the map's current location.
    pub async fn locate(&self) -> Result<Position, AppError> {
        self.require_session()?;
        self.lock_ui().map_loading = true;

        let result = self.reporter.get_current_position().await;

        let mut ui = self.lock_ui();
        ui.map_loading = false;
        match result {
            Ok(position) => {
                ui.current_location = Some(position.coords.clone());
                Ok(position)
            }
            Err(err) => {
                drop(ui);
                self.fail(err)
            }
        }
    }

    pub async fn map_view(&self) -> Result<MapView, AppError> {
        let active = self.active_shipment().await?;
        let ui = self.lock_ui();
        Ok(MapView::build(
            ui.current_location.clone(),
            active.as_ref(),
            ui.tracking.as_ref().is_some_and(WatchHandle::is_active),
            ui.map_loading,
        ))
    }

    /// Navigation link to the active shipment's destination.
    pub async fn navigate(&self) -> Result<String, AppError> {
        let view = self.map_view().await?;
        match view.navigation_url {
            Some(url) => Ok(url),
            None => {
                let toast = self.toasts.push(
                    "Navigation unavailable",
                    Some("Destination coordinates not available".to_string()),
                    ToastVariant::Destructive,
                );
                self.emit(DashboardEvent::Toast { toast });
                Err(AppError::BadRequest(
                    "destination coordinates not available".to_string(),
                ))
            }
        }
    }

    /// Registers this device for push. `Ok(None)` when denied or unsupported.
    pub async fn enable_notifications(&self) -> Result<Option<String>, AppError> {
        let session = self.require_session()?;
        match self.notifications.request_permission(&session.uid).await {
            Ok(Some(token)) => {
                self.notify("Notifications enabled", "You will be alerted about new shipments");
                Ok(Some(token))
            }
            Ok(None) => {
                self.notify(
                    "Notifications disabled",
                    "Notification permission was not granted",
                );
                Ok(None)
            }
            Err(err) => self.fail(err),
        }
    }

    pub fn messages(&self) -> Vec<PushMessage> {
        self.lock_ui().messages.iter().cloned().collect()
    }

    fn on_session(&self, session: Option<Session>) {
        let uid = session.as_ref().map(|session| session.uid.clone());
        let (changed, stale_watch) = {
            let mut ui = self.lock_ui();
            let changed = ui.session.as_ref().map(|s| &s.uid) != uid.as_ref();
            ui.session = session.clone();
            ui.session_loading = false;

            let mut stale_watch = None;
            if changed {
                ui.shipments.clear();
                ui.shipments_loading = uid.is_some();
                ui.uploading.clear();
                ui.current_location = None;
                ui.messages.clear();
                // A watch started by the incoming driver before this
                // notification arrived stays running.
                stale_watch = ui
                    .tracking
                    .take_if(|handle| uid.as_deref() != Some(handle.driver_id()));
            }
            (changed, stale_watch)
        };

        if let Some(handle) = stale_watch {
            self.reporter.stop_tracking(&handle);
        }

        if changed {
            let feed = uid.as_deref().map(|uid| self.watch_shipments(uid));
            let previous = std::mem::replace(&mut self.lock_feeds().shipments, feed);
            drop(previous);
            debug!(uid = ?uid, "session changed");
        }

        self.emit(DashboardEvent::Session { session });
        if changed {
            self.publish_board();
        }
    }

    fn watch_shipments(&self, uid: &str) -> Subscription {
        let me = self.me.clone();
        let owner = uid.to_string();
        self.shipments.subscribe(uid, move |shipments| {
            if let Some(dashboard) = me.upgrade() {
                dashboard.on_shipments(&owner, shipments);
            }
        })
    }

    fn on_shipments(&self, owner: &str, shipments: Vec<Shipment>) {
        {
            let mut ui = self.lock_ui();
            // Late snapshot from a feed that belonged to a previous session.
            if ui.session.as_ref().map(|s| s.uid.as_str()) != Some(owner) {
                return;
            }
            ui.shipments = shipments;
            ui.shipments_loading = false;
        }
        self.publish_board();
    }

    fn on_message(&self, message: PushMessage) {
        {
            let mut ui = self.lock_ui();
            ui.messages.push_back(message.clone());
            while ui.messages.len() > MESSAGE_HISTORY {
                ui.messages.pop_front();
            }
        }

        let title = message
            .title
            .clone()
            .unwrap_or_else(|| "New notification".to_string());
        let toast = self.toasts.push(title, message.body.clone(), ToastVariant::Default);
        self.emit(DashboardEvent::Message { message });
        self.emit(DashboardEvent::Toast { toast });
    }

    async fn owned_shipment(
        &self,
        session: &Session,
        shipment_id: &str,
    ) -> Result<Shipment, AppError> {
        let shipment = self.shipments.get(shipment_id).await?;
        if shipment.driver_id != session.uid {
            return Err(AppError::NotFound(format!("shipment {shipment_id} not found")));
        }
        Ok(shipment)
    }

    fn require_session(&self) -> Result<Session, AppError> {
        match self.session.current_session() {
            Some(session) => Ok(session),
            None => self.fail(AppError::Unauthenticated),
        }
    }

    fn publish_board(&self) {
        let board = {
            let ui = self.lock_ui();
            let uploading: Vec<String> = ui.uploading.iter().cloned().collect();
            ShipmentBoard::group(&ui.shipments, &uploading)
        };
        self.emit(DashboardEvent::Shipments { board });
    }

    fn notify(&self, title: &str, description: impl Into<String>) {
        let toast = self.toasts.info(title, description);
        self.emit(DashboardEvent::Toast { toast });
    }

    fn fail<T>(&self, err: AppError) -> Result<T, AppError> {
        let toast = self.toasts.failure(&err);
        self.emit(DashboardEvent::Toast { toast });
        Err(err)
    }

    fn emit(&self, event: DashboardEvent) {
        // No live clients is not an error.
        let _ = self.events.send(event);
    }

    fn lock_ui(&self) -> MutexGuard<'_, UiState> {
        self.ui.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_feeds(&self) -> MutexGuard<'_, Feeds> {
        self.feeds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
