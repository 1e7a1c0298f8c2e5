use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{AppError, AuthError};
use crate::models::driver::DriverProfile;
use crate::models::session::Session;
use crate::observability::metrics::Metrics;
use crate::platform::{DocumentStore, IdentityProvider, PlatformError};
use crate::services::subscription::Subscription;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone)]
pub struct SessionGateway {
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
    metrics: Metrics,
}

impl SessionGateway {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        metrics: Metrics,
    ) -> Self {
        Self {
            identity,
            documents,
            metrics,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        require_credentials(email, password)?;

        let session = self
            .identity
            .sign_in(email, password)
            .await
            .map_err(|err| {
                error!(error = %err, "sign-in failed");
                auth_error(err)
            })?;

        info!(uid = %session.uid, "driver signed in");
        Ok(session)
    }

    /// Creates the account and its driver profile. If the profile cannot be
    /// written the fresh account is deleted again.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AppError> {
        require_credentials(email, password)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            ))
            .into());
        }
        if display_name.trim().is_empty() {
            return Err(AuthError::InvalidInput("name cannot be empty".to_string()).into());
        }

        let session = self
            .identity
            .create_account(email, password, display_name)
            .await
            .map_err(|err| {
                error!(error = %err, "account creation failed");
                auth_error(err)
            })?;

        let profile = DriverProfile::new(
            session.uid.clone(),
            display_name.trim(),
            session.email.clone(),
        );
        if let Err(err) = self.documents.create_driver(profile).await {
            error!(uid = %session.uid, error = %err, "driver profile creation failed; removing account");
            if let Err(cleanup) = self.identity.delete_account(&session.uid).await {
                warn!(uid = %session.uid, error = %cleanup, "account cleanup failed; orphaned account left behind");
                if let Err(err) = self.identity.sign_out().await {
                    error!(uid = %session.uid, error = %err, "sign-out after failed cleanup failed");
                }
            }
            return Err(AuthError::ProfileCreation(err.to_string()).into());
        }

        info!(uid = %session.uid, "driver registered");
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.identity.sign_out().await.map_err(|err| {
            error!(error = %err, "sign-out failed");
            auth_error(err)
        })?;
        info!("driver signed out");
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
        if email.trim().is_empty() {
            return Err(AuthError::InvalidInput("email is required".to_string()).into());
        }
        self.identity
            .send_password_reset(email)
            .await
            .map_err(|err| {
                error!(error = %err, "password reset request failed");
                auth_error(err)
            })
    }

    pub fn current_session(&self) -> Option<Session> {
        self.identity.session_changes().borrow().clone()
    }

    /// Calls `callback` with the current session right away and again after
    /// every sign-in or sign-out.
    pub fn observe_session<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<Session>) + Send + Sync + 'static,
    {
        let mut changes = self.identity.session_changes();

        Subscription::spawn(&self.metrics, move |token| async move {
            let initial = changes.borrow_and_update().clone();
            callback(initial);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            warn!("identity provider closed the session feed");
                            break;
                        }
                        let session = changes.borrow_and_update().clone();
                        callback(session);
                    }
                }
            }
        })
    }

    pub fn session_feed(&self) -> watch::Receiver<Option<Session>> {
        self.identity.session_changes()
    }
}

fn require_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidInput("a valid email is required".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".to_string()));
    }
    Ok(())
}

fn auth_error(err: PlatformError) -> AppError {
    let auth = match err {
        PlatformError::InvalidCredentials | PlatformError::NotFound(_) => {
            AuthError::InvalidCredentials
        }
        PlatformError::EmailInUse => AuthError::EmailInUse,
        PlatformError::UnknownEmail => AuthError::UnknownEmail,
        other => AuthError::Network(other.to_string()),
    };
    AppError::Auth(auth)
}
