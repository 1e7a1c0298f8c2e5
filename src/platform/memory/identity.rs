use std::sync::atomic::{AtomicBool, Ordering};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::models::session::Session;
use crate::platform::{IdentityProvider, PlatformError, PlatformResult};

struct Account {
    uid: String,
    email: String,
    display_name: String,
    password_hash: String,
}

/// Identity provider holding accounts in process memory.
///
/// Keeps one persisted session, like a device-bound auth client would.
pub struct MemoryIdentity {
    accounts: DashMap<String, Account>,
    current: watch::Sender<Option<Session>>,
    password_resets: DashMap<String, DateTime<Utc>>,
    offline: AtomicBool,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        let (current, _unused_rx) = watch::channel(None);
        Self {
            accounts: DashMap::new(),
            current,
            password_resets: DashMap::new(),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates losing the connection to the identity service.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn password_reset_requested(&self, email: &str) -> Option<DateTime<Utc>> {
        self.password_resets
            .get(&normalize_email(email))
            .map(|entry| *entry.value())
    }

    /// Creates an account without signing it in. Used for seeding.
    pub fn provision(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> PlatformResult<Session> {
        self.insert_account(email, password, display_name)
    }

    fn insert_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> PlatformResult<Session> {
        let key = normalize_email(email);
        if self.accounts.contains_key(&key) {
            return Err(PlatformError::EmailInUse);
        }
        let password_hash = hash_password(password)?;

        match self.accounts.entry(key) {
            Entry::Occupied(_) => Err(PlatformError::EmailInUse),
            Entry::Vacant(vacant) => {
                let account = Account {
                    uid: Uuid::new_v4().to_string(),
                    email: email.trim().to_string(),
                    display_name: display_name.trim().to_string(),
                    password_hash,
                };
                Ok(session_for(vacant.insert(account).value()))
            }
        }
    }

    fn ensure_online(&self) -> PlatformResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("identity service offline".to_string()));
        }
        Ok(())
    }

    fn establish(&self, account: &Account) -> Session {
        let session = session_for(account);
        self.current.send_replace(Some(session.clone()));
        session
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> PlatformResult<Session> {
        self.ensure_online()?;

        let session = self.insert_account(email, password, display_name)?;
        self.current.send_replace(Some(session.clone()));

        debug!(uid = %session.uid, "account created");
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<Session> {
        self.ensure_online()?;

        let account = self
            .accounts
            .get(&normalize_email(email))
            .ok_or(PlatformError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(PlatformError::InvalidCredentials);
        }

        Ok(self.establish(&account))
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        self.ensure_online()?;
        self.current.send_if_modified(|current| current.take().is_some());
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> PlatformResult<()> {
        self.ensure_online()?;

        let key = self
            .accounts
            .iter()
            .find(|entry| entry.value().uid == uid)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| PlatformError::NotFound(format!("account {uid}")))?;
        self.accounts.remove(&key);

        self.current.send_if_modified(|current| {
            if current.as_ref().is_some_and(|session| session.uid == uid) {
                *current = None;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> PlatformResult<()> {
        self.ensure_online()?;

        let key = normalize_email(email);
        if !self.accounts.contains_key(&key) {
            return Err(PlatformError::UnknownEmail);
        }
        self.password_resets.insert(key, Utc::now());
        Ok(())
    }

    fn session_changes(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }
}

fn session_for(account: &Account) -> Session {
    Session {
        uid: account.uid.clone(),
        display_name: Some(account.display_name.clone()),
        email: account.email.clone(),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Low-cost Argon2id parameters.
fn hasher() -> PlatformResult<Argon2<'static>> {
    let params = Params::new(4096, 1, 1, None)
        .map_err(|err| PlatformError::Unavailable(format!("invalid hash params: {err}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn hash_password(password: &str) -> PlatformResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PlatformError::Unavailable(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    hasher()
        .map(|argon2| argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
