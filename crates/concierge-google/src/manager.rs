//! Credential manager for the calendar integration.
//!
//! [`CredentialManager::acquire_handle`] is the only way callers get an
//! [`AuthorizedClient`]. It walks the credential lifecycle:
//!
//! ```text
//! ABSENT ──load──▶ LOADED_VALID ───────────────────────────▶ VALID
//!    │                                                         ▲
//!    │     LOADED_INVALID ──refresh──▶ REFRESHING ──ok─────────┤
//!    │                                     │                   │
//!    │                                     └─fail: remove file─┐
//!    ▼                                                         ▼
//! AUTHORIZING ◀───────────────────────────────────────────── ABSENT
//!    │ ok                                                      ▲
//!    └──▶ VALID ──▶ PERSISTED               fail ──────────────┘
//! ```
//!
//! One acquisition sequence runs at a time. Callers that queued behind a
//! running sequence take its outcome instead of starting their own, so a
//! burst of calls with an expired token causes a single refresh (or a single
//! browser prompt), and every caller in the burst sees the same result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{ManagerConfig, PersistFailurePolicy};
use crate::error::{AcquireFailure, AuthError, AuthErrorCode, AuthResult};
use crate::handle::AuthorizedClient;
use crate::oauth::{LoopbackConsentFlow, OAuthClient};
use crate::pool::BlockingPool;
use crate::secret::ClientSecret;
use crate::tokens::{CredentialRecord, RecordState, RefreshedToken, TokenStore};

/// Exchanges a refresh token for a new access token. Blocking.
pub trait TokenRefresher: Send + Sync {
    /// Performs one refresh exchange.
    fn refresh(&self, secret: &ClientSecret, refresh_token: &str) -> AuthResult<RefreshedToken>;
}

/// Obtains a brand new credential record from the human. Blocking.
pub trait ConsentFlow: Send + Sync {
    /// Runs the interactive authorization for `scopes`.
    fn authorize(&self, secret: &ClientSecret, scopes: &[String]) -> AuthResult<CredentialRecord>;
}

/// Result of [`CredentialManager::acquire_handle`].
///
/// Carries a handle on success and the failure otherwise, never both.
#[derive(Debug, Clone)]
pub struct Acquisition {
    handle: Option<Arc<AuthorizedClient>>,
    failure: Option<AcquireFailure>,
}

impl Acquisition {
    fn ready(handle: Arc<AuthorizedClient>) -> Self {
        Self {
            handle: Some(handle),
            failure: None,
        }
    }

    fn failed(failure: AcquireFailure) -> Self {
        Self {
            handle: None,
            failure: Some(failure),
        }
    }

    /// Returns true if a usable handle was obtained.
    pub fn is_success(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns the handle, if any.
    pub fn handle(&self) -> Option<&Arc<AuthorizedClient>> {
        self.handle.as_ref()
    }

    /// Returns the failure, if any.
    pub fn failure(&self) -> Option<&AcquireFailure> {
        self.failure.as_ref()
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<Arc<AuthorizedClient>, AcquireFailure> {
        match (self.handle, self.failure) {
            (Some(handle), _) => Ok(handle),
            (None, Some(failure)) => Err(failure),
            (None, None) => Err(AuthError::internal("acquisition produced no handle").into()),
        }
    }
}

/// What the token store currently holds, as seen by [`CredentialManager::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCredential {
    /// No token file.
    Absent,
    /// A usable access token.
    Valid {
        /// When the access token expires, if it does.
        expiry: Option<DateTime<Utc>>,
    },
    /// An expired access token with a refresh token.
    Refreshable,
    /// Neither usable nor refreshable, or missing required scopes.
    Unusable,
    /// The file exists but cannot be read or parsed.
    Unreadable(String),
}

/// Snapshot of the manager's state. Never touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    /// Whether the client secret file exists.
    pub client_secret_present: bool,
    /// Whether a valid handle is cached in memory.
    pub cached_handle: bool,
    /// Whether an acquisition sequence is running right now.
    pub acquisition_in_progress: bool,
    /// What the token store holds.
    pub stored: StoredCredential,
}

#[derive(Default)]
struct ManagerState {
    handle: Option<Arc<AuthorizedClient>>,
    last_outcome: Option<Acquisition>,
    /// Access token of the last invalidated handle.
    rejected_token: Option<String>,
}

/// Produces authorized calendar clients on demand.
///
/// Share one instance per process behind an `Arc`.
pub struct CredentialManager {
    config: ManagerConfig,
    store: TokenStore,
    pool: BlockingPool,
    refresher: Arc<dyn TokenRefresher>,
    consent: Arc<dyn ConsentFlow>,
    state: Mutex<ManagerState>,
    /// Number of acquisition sequences that have finished.
    completed: AtomicU64,
}

impl CredentialManager {
    /// Creates a manager using the provider's token endpoint and the
    /// loopback browser consent flow.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn new(config: ManagerConfig) -> AuthResult<Self> {
        let oauth = OAuthClient::new(config.timeout);
        let consent = LoopbackConsentFlow::new(oauth.clone(), config.loopback_port_range)
            .with_callback_timeout(config.consent_timeout)
            .with_open_browser(config.open_browser);
        Self::with_flows(config, Arc::new(oauth), Arc::new(consent))
    }

    /// Creates a manager with custom refresh and consent implementations.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn with_flows(
        config: ManagerConfig,
        refresher: Arc<dyn TokenRefresher>,
        consent: Arc<dyn ConsentFlow>,
    ) -> AuthResult<Self> {
        config.validate().map_err(AuthError::configuration)?;

        Ok(Self {
            store: TokenStore::new(&config.token_path),
            pool: BlockingPool::new(config.worker_threads),
            config,
            refresher,
            consent,
            state: Mutex::new(ManagerState::default()),
            completed: AtomicU64::new(0),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the token store.
    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Returns a ready-to-use client, or the reason none could be produced.
    ///
    /// Never returns an error directly: every failure is reported through
    /// [`Acquisition::failure`].
    pub async fn acquire_handle(&self) -> Acquisition {
        let observed = self.completed.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if self.completed.load(Ordering::Acquire) != observed
            && let Some(outcome) = &state.last_outcome
        {
            debug!("sharing outcome of the acquisition that finished while waiting");
            return outcome.clone();
        }

        let outcome = self.run_sequence(&mut state).await;
        state.last_outcome = Some(outcome.clone());
        self.completed.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Drops the cached handle so the next acquisition starts from the
    /// token store.
    ///
    /// Call after the provider rejected the handle's access token. If the
    /// store still holds that same token, the next acquisition refreshes it
    /// (or re-authorizes when it cannot be refreshed) instead of reusing it.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.handle.take() {
            state.rejected_token = Some(handle.access_token().to_string());
        }
        state.last_outcome = None;
        info!("cached calendar client invalidated");
    }

    /// Reports the manager's state without running an acquisition.
    pub fn status(&self) -> CredentialStatus {
        let (cached_handle, acquisition_in_progress) = match self.state.try_lock() {
            Ok(state) => (state.handle.as_ref().is_some_and(|h| h.is_valid()), false),
            Err(_) => (false, true),
        };

        let stored = match self.store.load() {
            Ok(None) => StoredCredential::Absent,
            Ok(Some(record)) => {
                let record = self.adopt_scopes(record);
                match self.classify(&record) {
                    RecordState::Valid => StoredCredential::Valid {
                        expiry: record.expiry,
                    },
                    RecordState::Refreshable => StoredCredential::Refreshable,
                    RecordState::Unusable => StoredCredential::Unusable,
                }
            }
            Err(e) => StoredCredential::Unreadable(e.message().to_string()),
        };

        CredentialStatus {
            client_secret_present: self.config.client_secret_path.is_file(),
            cached_handle,
            acquisition_in_progress,
            stored,
        }
    }

    async fn run_sequence(&self, state: &mut ManagerState) -> Acquisition {
        let cached = match state.handle.take() {
            Some(handle) if handle.is_valid() => {
                state.handle = Some(Arc::clone(&handle));
                return Acquisition::ready(handle);
            }
            Some(handle) => {
                debug!("cached calendar client has expired");
                Some(handle.record().clone())
            }
            None => None,
        };

        match self.obtain(cached, state.rejected_token.as_deref()).await {
            Ok(handle) => {
                state.rejected_token = None;
                state.handle = Some(Arc::clone(&handle));
                Acquisition::ready(handle)
            }
            Err(err) => {
                error!(code = %err.code(), "failed to acquire calendar credentials: {}", err.message());
                Acquisition::failed(err.into())
            }
        }
    }

    async fn obtain(
        &self,
        cached: Option<CredentialRecord>,
        rejected_token: Option<&str>,
    ) -> AuthResult<Arc<AuthorizedClient>> {
        let secret_path = &self.config.client_secret_path;
        if !secret_path.is_file() {
            return Err(AuthError::configuration(format!(
                "client secret file not found at {}",
                secret_path.display()
            )));
        }

        let stored = match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("ignoring unreadable token file {}: {}", self.store.path().display(), e);
                None
            }
        };
        let record = stored.or(cached).map(|r| self.adopt_scopes(r));
        let state = match record.as_ref() {
            None => RecordState::Unusable,
            Some(r) if rejected_token == Some(r.access_token.as_str()) => {
                info!("stored access token was rejected by the provider");
                if r.is_refreshable() {
                    RecordState::Refreshable
                } else {
                    RecordState::Unusable
                }
            }
            Some(r) => self.classify(r),
        };

        let record = match (state, record) {
            (RecordState::Valid, Some(record)) => {
                debug!("using stored credentials");
                record
            }
            (RecordState::Refreshable, Some(record)) => {
                let secret = Arc::new(ClientSecret::from_file(secret_path)?);
                let fresh = match self.refresh(&secret, record).await {
                    Ok(record) => record,
                    Err(refresh_err) => {
                        warn!("token refresh failed, discarding stored credentials: {}", refresh_err);
                        self.discard_store();
                        self.consent(secret).await.map_err(|e| {
                            if e.code() == AuthErrorCode::Authorization {
                                AuthError::refresh(format!(
                                    "{}; re-authorization failed: {}",
                                    refresh_err.message(),
                                    e.message()
                                ))
                            } else {
                                e
                            }
                        })?
                    }
                };
                self.persist(&fresh)?;
                fresh
            }
            (_, record) => {
                if record.is_some() {
                    info!("stored credentials are unusable, starting authorization");
                } else {
                    info!("no stored credentials, starting authorization");
                }
                let secret = Arc::new(ClientSecret::from_file(secret_path)?);
                let fresh = self.consent(secret).await?;
                self.persist(&fresh)?;
                fresh
            }
        };

        let timeout = self.config.timeout;
        let handle = self
            .pool
            .run(move || AuthorizedClient::build(record, timeout))
            .await??;
        Ok(Arc::new(handle))
    }

    async fn refresh(
        &self,
        secret: &Arc<ClientSecret>,
        mut record: CredentialRecord,
    ) -> AuthResult<CredentialRecord> {
        let Some(refresh_token) = record.refresh_token.clone() else {
            return Err(AuthError::refresh("no refresh token"));
        };

        info!("access token expired, refreshing");
        let refresher = Arc::clone(&self.refresher);
        let secret = Arc::clone(secret);
        let refreshed = self
            .pool
            .run(move || refresher.refresh(&secret, &refresh_token))
            .await??;

        record.apply_refresh(refreshed);
        if record.access_token.is_empty() {
            return Err(AuthError::refresh("provider returned an empty access token"));
        }
        Ok(record)
    }

    async fn consent(&self, secret: Arc<ClientSecret>) -> AuthResult<CredentialRecord> {
        let consent = Arc::clone(&self.consent);
        let scopes = self.config.scopes.clone();
        let record = self
            .pool
            .run(move || consent.authorize(&secret, &scopes))
            .await??;
        info!("interactive authorization completed");
        Ok(self.adopt_scopes(record))
    }

    fn persist(&self, record: &CredentialRecord) -> AuthResult<()> {
        match self.store.save(record) {
            Ok(()) => {
                info!("saved credentials to {}", self.store.path().display());
                Ok(())
            }
            Err(err) => match self.config.persist_failure {
                PersistFailurePolicy::Tolerate => {
                    warn!("continuing with unsaved credentials: {}", err);
                    Ok(())
                }
                PersistFailurePolicy::Fail => Err(err),
            },
        }
    }

    fn discard_store(&self) {
        if let Err(e) = self.store.remove() {
            warn!("{}", e);
        }
    }

    /// Records without scopes were written by tooling that did not track
    /// them; they are taken to hold the configured ones.
    fn adopt_scopes(&self, mut record: CredentialRecord) -> CredentialRecord {
        if record.scopes.is_empty() {
            record.scopes = self.config.scopes.iter().cloned().collect();
        }
        record
    }

    fn classify(&self, record: &CredentialRecord) -> RecordState {
        if !record.has_scopes(&self.config.scopes) {
            return RecordState::Unusable;
        }
        record.state()
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
