use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::notification::{Permission, PushMessage};
use crate::observability::metrics::Metrics;
use crate::platform::{DocumentStore, DriverUpdate, PlatformError, PushMessaging};
use crate::services::subscription::Subscription;

#[derive(Clone)]
pub struct NotificationRegistrar {
    messaging: Arc<dyn PushMessaging>,
    documents: Arc<dyn DocumentStore>,
    metrics: Metrics,
}

impl NotificationRegistrar {
    pub fn new(
        messaging: Arc<dyn PushMessaging>,
        documents: Arc<dyn DocumentStore>,
        metrics: Metrics,
    ) -> Self {
        Self {
            messaging,
            documents,
            metrics,
        }
    }

    /// Asks for push permission and registers this device's token on the
    /// driver's profile. `Ok(None)` when denied or unsupported.
    pub async fn request_permission(&self, user_id: &str) -> Result<Option<String>, AppError> {
        if !self.messaging.is_supported() {
            info!("push messaging is not available on this device");
            return Ok(None);
        }

        let permission = match self.messaging.request_permission().await {
            Ok(permission) => permission,
            Err(PlatformError::Unsupported(_)) => return Ok(None),
            Err(err) => {
                error!(error = %err, "permission request failed");
                return Err(AppError::Registration(err.to_string()));
            }
        };
        if permission == Permission::Denied {
            info!(user_id, "notification permission denied");
            return Ok(None);
        }

        let token = match self.messaging.get_token().await {
            Ok(token) => token,
            Err(PlatformError::PermissionDenied) => return Ok(None),
            Err(err) => {
                error!(error = %err, "failed to acquire push token");
                return Err(AppError::Registration(err.to_string()));
            }
        };

        self.documents
            .update_driver(user_id, DriverUpdate::AddPushToken(token.clone()))
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "failed to save push token");
                AppError::Registration(err.to_string())
            })?;

        info!(user_id, "push token registered");
        Ok(Some(token))
    }

    /// Delivers foreground push messages to `callback`. Returns an inert
    /// handle when messaging is unsupported.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PushMessage) + Send + Sync + 'static,
    {
        let Some(mut messages) = self.messaging.messages() else {
            debug!("push messaging unsupported; message listener not attached");
            return Subscription::inert();
        };

        Subscription::spawn(&self.metrics, move |token| async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = messages.recv() => match message {
                        Ok(message) => {
                            debug!(message_id = %message.id, "push message received");
                            callback(message);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "dropped push messages");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        })
    }
}
