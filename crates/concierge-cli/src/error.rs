//! Client error types.

use std::fmt;

use concierge_core::TracingError;
use concierge_google::{AcquireFailure, AuthError, AuthErrorCode};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Credential acquisition or provider error.
    Auth(String),
    /// Stored credentials exist but cannot be used.
    AuthRequired(String),
    /// IO error.
    Io(std::io::Error),
    /// Logging could not be initialized.
    Tracing(String),
    /// The calendar tool reported a failure.
    Event(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Auth(msg) => write!(f, "authentication failed: {}", msg),
            Self::AuthRequired(msg) => write!(f, "authentication required: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Tracing(msg) => write!(f, "logging error: {}", msg),
            Self::Event(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        if err.code() == AuthErrorCode::Configuration {
            Self::Config(err.message().to_string())
        } else {
            Self::Auth(err.to_string())
        }
    }
}

impl From<AcquireFailure> for ClientError {
    fn from(failure: AcquireFailure) -> Self {
        if failure.is_configuration() {
            Self::Config(failure.message().to_string())
        } else {
            Self::Auth(failure.to_string())
        }
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Tracing(err.to_string())
    }
}
