//! Credential manager and calendar client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// What to do when fresh credentials cannot be written to the token store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistFailurePolicy {
    /// Log the failure and keep using the unsaved credentials.
    ///
    /// The next process start will have to refresh or authorize again.
    #[default]
    Tolerate,
    /// Report the acquisition as failed.
    Fail,
}

/// Configuration for the [`CredentialManager`](crate::CredentialManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Path to the provider-issued client secret JSON file.
    pub client_secret_path: PathBuf,

    /// Path of the persisted token store.
    pub token_path: PathBuf,

    /// OAuth scopes to request. Fixed at deployment time.
    pub scopes: Vec<String>,

    /// Timeout for token endpoint requests and for API clients built from
    /// the credentials.
    pub timeout: Duration,

    /// How long the consent flow waits for the browser redirect.
    ///
    /// `None` waits indefinitely.
    pub consent_timeout: Option<Duration>,

    /// Port range for the loopback OAuth redirect server.
    ///
    /// `(0, 0)` lets the operating system pick a free port.
    pub loopback_port_range: (u16, u16),

    /// Number of blocking jobs (refresh, consent, client construction)
    /// that may run at once.
    pub worker_threads: usize,

    /// Whether the browser is opened automatically for consent.
    pub open_browser: bool,

    /// Behavior when fresh credentials cannot be persisted.
    pub persist_failure: PersistFailurePolicy,
}

impl ManagerConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default size of the blocking worker pool.
    pub const DEFAULT_WORKER_THREADS: usize = 4;

    /// Default OAuth scope for full calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar";

    /// Creates a configuration for the given client secret and token paths.
    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            consent_timeout: None,
            loopback_port_range: (0, 0),
            worker_threads: Self::DEFAULT_WORKER_THREADS,
            open_browser: true,
            persist_failure: PersistFailurePolicy::default(),
        }
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bounds the wait for the consent redirect.
    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = Some(timeout);
        self
    }

    /// Sets the loopback port range for OAuth.
    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    /// Sets the blocking worker pool size.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Enables or disables opening the browser during consent.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Sets the persistence failure policy.
    pub fn with_persist_failure(mut self, policy: PersistFailurePolicy) -> Self {
        self.persist_failure = policy;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_secret_path.as_os_str().is_empty() {
            return Err("client secret file path is not configured".to_string());
        }
        if self.token_path.as_os_str().is_empty() {
            return Err("token file path is not configured".to_string());
        }
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err("invalid loopback port range".to_string());
        }
        if self.worker_threads == 0 {
            return Err("worker_threads must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Configuration for the [`CalendarClient`](crate::calendar::CalendarClient).
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Base URL of the Calendar API.
    pub api_base: String,

    /// Calendar that receives new events.
    pub calendar_id: String,

    /// IANA timezone attached to timed events.
    pub timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            api_base: Self::DEFAULT_API_BASE.to_string(),
            calendar_id: "primary".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

impl CalendarConfig {
    /// Base URL for Google Calendar API v3.
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";

    /// Sets the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the target calendar.
    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    /// Sets the event timezone.
    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = tz.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.api_base).map_err(|e| format!("invalid api_base: {}", e))?;
        if self.calendar_id.is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        if self.timezone.is_empty() {
            return Err("timezone must not be empty".to_string());
        }
        Ok(())
    }
}
