//! Error types for credential and calendar operations.
//!
//! Every failure inside the credential manager is classified by an
//! [`AuthErrorCode`]. The manager never lets an [`AuthError`] escape
//! [`acquire_handle`](crate::CredentialManager::acquire_handle); it converts
//! it into an [`AcquireFailure`], which is cheap to clone so that every
//! caller coalesced onto one acquisition sees the same failure.

use std::fmt;
use thiserror::Error;

/// The category of a credential or calendar error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// Required files are missing or unreadable, or settings are invalid.
    Configuration,
    /// The refresh exchange was rejected or could not reach the provider.
    Refresh,
    /// The interactive consent flow failed, was denied or was cancelled.
    Authorization,
    /// The token store could not be read or written.
    Persistence,
    /// The calendar API call failed after a valid handle was obtained.
    ProviderApi,
    /// Network error talking to the provider.
    Network,
    /// The provider answered with something we could not parse.
    InvalidResponse,
    /// Unexpected internal state (worker pool closed, job panicked).
    Internal,
}

impl AuthErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Returns true if the human has to go through the consent flow again.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::Refresh | Self::Authorization)
    }

    /// Returns a stable machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::Refresh => "refresh_error",
            Self::Authorization => "authorization_error",
            Self::Persistence => "persistence_error",
            Self::ProviderApi => "provider_api_error",
            Self::Network => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while managing credentials or calling the calendar API.
#[derive(Debug, Error)]
pub struct AuthError {
    code: AuthErrorCode,
    message: String,
    /// HTTP status returned by the provider, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    /// Creates a new error with the given code and message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Configuration, message)
    }

    /// Creates a refresh error.
    pub fn refresh(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Refresh, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Authorization, message)
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Persistence, message)
    }

    /// Creates a provider API error.
    pub fn provider_api(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::ProviderApi, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Network, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InvalidResponse, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Internal, message)
    }

    /// Records the HTTP status the provider answered with.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the provider answered.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if the provider rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for credential and calendar operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Why [`acquire_handle`](crate::CredentialManager::acquire_handle) could not
/// produce a usable client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct AcquireFailure {
    code: AuthErrorCode,
    message: String,
}

impl AcquireFailure {
    /// Returns the error code.
    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the failure stems from configuration, not credentials.
    pub fn is_configuration(&self) -> bool {
        self.code == AuthErrorCode::Configuration
    }

    /// Returns true if the human has to authorize again.
    pub fn requires_reauthorization(&self) -> bool {
        self.code.requires_reauthorization()
    }
}

impl From<&AuthError> for AcquireFailure {
    fn from(err: &AuthError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
        }
    }
}

impl From<AuthError> for AcquireFailure {
    fn from(err: AuthError) -> Self {
        Self::from(&err)
    }
}
