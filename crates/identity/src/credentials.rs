//! Access-token lifecycle for the Management API.
//!
//! One token is shared by every request in the process. It is fetched once at
//! startup and then refreshed on a fixed interval by a background task; a
//! failed refresh keeps the previous token in service.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::CredentialError;
use crate::secret::SecretString;

/// Bearer token for the Management API.
#[derive(Debug, Clone)]
pub struct AccessToken {
    value: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: SecretString::new(value),
            expires_at,
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// Source of the token attached to every Management API call.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Obtains a fresh token from the platform's token endpoint.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken, CredentialError>;
}

/// Fixed token (tests, local runs against a pre-issued token).
#[derive(Debug, Clone)]
pub struct StaticCredential {
    token: AccessToken,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token, None),
        }
    }
}

impl CredentialProvider for StaticCredential {
    fn access_token(&self) -> Result<AccessToken, CredentialError> {
        Ok(self.token.clone())
    }
}

/// Process-wide token that a background task keeps fresh.
pub struct RefreshingCredential {
    current: RwLock<Option<AccessToken>>,
    fetcher: Arc<dyn TokenFetcher>,
}

impl core::fmt::Debug for RefreshingCredential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let expires_at = self
            .current
            .read()
            .ok()
            .and_then(|t| t.as_ref().and_then(AccessToken::expires_at));
        f.debug_struct("RefreshingCredential")
            .field("expires_at", &expires_at)
            .finish_non_exhaustive()
    }
}

impl RefreshingCredential {
    /// Fetch the initial token. Startup must fail if this fails: there is no
    /// previous token to fall back on.
    pub async fn initialize(fetcher: Arc<dyn TokenFetcher>) -> Result<Arc<Self>, CredentialError> {
        let token = fetcher.fetch().await?;
        info!(expires_at = ?token.expires_at(), "initial management API token obtained");

        Ok(Arc::new(Self {
            current: RwLock::new(Some(token)),
            fetcher,
        }))
    }

    /// Fetch a new token and swap it in.
    ///
    /// On failure the error is logged, returned, and the current token is kept.
    pub async fn refresh(&self) -> Result<(), CredentialError> {
        match self.fetcher.fetch().await {
            Ok(token) => {
                let expires_at = token.expires_at();
                if let Ok(mut slot) = self.current.write() {
                    *slot = Some(token);
                }
                info!(expires_at = ?expires_at, "management API token refreshed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "management API token refresh failed; keeping previous token");
                Err(e)
            }
        }
    }

    /// Spawn the fixed-interval refresh loop on the current tokio runtime.
    ///
    /// The first refresh happens one full `interval` after the call.
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> RefreshHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let credential = Arc::clone(self);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        // Failure already logged; the old token stays in use.
                        let _ = credential.refresh().await;
                    }
                }
            }
        });

        RefreshHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

impl CredentialProvider for RefreshingCredential {
    fn access_token(&self) -> Result<AccessToken, CredentialError> {
        self.current
            .read()
            .ok()
            .and_then(|t| t.clone())
            .ok_or(CredentialError::Unavailable)
    }
}

/// Handle to the background refresh task (stops it on shutdown or drop).
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Request shutdown and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl TokenFetcher for CountingFetcher {
        async fn fetch(&self) -> Result<AccessToken, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(CredentialError::Rejected {
                    status: 401,
                    message: "access_denied".into(),
                });
            }
            Ok(AccessToken::new(format!("token-{n}"), None))
        }
    }

    #[tokio::test]
    async fn initialize_stores_first_token() {
        let fetcher = CountingFetcher::new();
        let cred = RefreshingCredential::initialize(fetcher.clone()).await.unwrap();

        assert_eq!(cred.access_token().unwrap().secret().expose(), "token-1");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn initialize_fails_when_first_fetch_fails() {
        let fetcher = CountingFetcher::new();
        fetcher.failing.store(true, Ordering::SeqCst);

        let result = RefreshingCredential::initialize(fetcher).await;
        assert!(matches!(result, Err(CredentialError::Rejected { status: 401, .. })));
    }

    #[tokio::test]
    async fn refresh_replaces_token() {
        let fetcher = CountingFetcher::new();
        let cred = RefreshingCredential::initialize(fetcher.clone()).await.unwrap();

        cred.refresh().await.unwrap();
        assert_eq!(cred.access_token().unwrap().secret().expose(), "token-2");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_token() {
        let fetcher = CountingFetcher::new();
        let cred = RefreshingCredential::initialize(fetcher.clone()).await.unwrap();

        fetcher.failing.store(true, Ordering::SeqCst);
        assert!(cred.refresh().await.is_err());
        assert_eq!(cred.access_token().unwrap().secret().expose(), "token-1");
    }

    #[tokio::test]
    async fn background_task_refreshes_on_interval_until_shutdown() {
        let fetcher = CountingFetcher::new();
        let cred = RefreshingCredential::initialize(fetcher.clone()).await.unwrap();

        let handle = cred.spawn_refresh(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.shutdown().await;

        let after_shutdown = fetcher.calls.load(Ordering::SeqCst);
        assert!(after_shutdown >= 3, "expected periodic refreshes, got {after_shutdown} fetches");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), after_shutdown);
    }

    #[test]
    fn static_credential_always_returns_its_token() {
        let cred = StaticCredential::new("fixed");
        assert_eq!(cred.access_token().unwrap().secret().expose(), "fixed");
    }
}
