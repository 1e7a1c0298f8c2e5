use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::notification::{Permission, PushMessage};
use crate::platform::{PlatformError, PlatformResult, PushMessaging};

pub struct MemoryMessaging {
    supported: bool,
    permission: Mutex<Permission>,
    token: Mutex<Option<String>>,
    messages_tx: broadcast::Sender<PushMessage>,
    offline: AtomicBool,
}

impl MemoryMessaging {
    pub fn new(supported: bool, permission: Permission, event_buffer_size: usize) -> Self {
        let (messages_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        Self {
            supported,
            permission: Mutex::new(permission),
            token: Mutex::new(None),
            messages_tx,
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_permission(&self, permission: Permission) {
        *self
            .permission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = permission;
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delivers a message to every foreground listener. Returns how many
    /// listeners received it.
    pub fn deliver(&self, message: PushMessage) -> usize {
        if !self.supported {
            return 0;
        }
        self.messages_tx.send(message).unwrap_or(0)
    }

    fn ensure_ready(&self) -> PlatformResult<()> {
        if !self.supported {
            return Err(PlatformError::Unsupported("push messaging".to_string()));
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("messaging service offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PushMessaging for MemoryMessaging {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_permission(&self) -> PlatformResult<Permission> {
        self.ensure_ready()?;
        Ok(*self
            .permission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    async fn get_token(&self) -> PlatformResult<String> {
        self.ensure_ready()?;

        let permission = *self
            .permission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if permission == Permission::Denied {
            return Err(PlatformError::PermissionDenied);
        }

        let mut token = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(token
            .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone())
    }

    fn messages(&self) -> Option<broadcast::Receiver<PushMessage>> {
        self.supported.then(|| self.messages_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryMessaging;
    use crate::models::notification::Permission;
    use crate::platform::{PlatformError, PushMessaging};

    #[tokio::test]
    async fn token_is_stable_per_device() {
        let messaging = MemoryMessaging::new(true, Permission::Granted, 8);
        let first = messaging.get_token().await.unwrap();
        let second = messaging.get_token().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unsupported_runtime_has_no_feed() {
        let messaging = MemoryMessaging::new(false, Permission::Granted, 8);
        assert!(messaging.messages().is_none());
        assert!(matches!(
            messaging.request_permission().await,
            Err(PlatformError::Unsupported(_))
        ));
    }
}
