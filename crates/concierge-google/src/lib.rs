//! Google OAuth credential management and calendar event creation.
//!
//! This crate owns the credential lifecycle of the calendar integration:
//!
//! - [`CredentialManager`] - hands out [`AuthorizedClient`]s, refreshing or
//!   re-authorizing as needed, one acquisition at a time
//! - [`TokenStore`] / [`CredentialRecord`] - the persisted token file
//! - [`ClientSecret`] - the provider-issued OAuth client descriptor
//! - [`OAuthClient`] / [`LoopbackConsentFlow`] - token endpoint calls and
//!   the interactive browser flow
//! - [`calendar`] - the `add_calendar_event` tool built on top
//!
//! # Architecture
//!
//! ```text
//!   CalendarTool ──acquire_handle()──▶ CredentialManager ──▶ TokenStore (token.json)
//!        │                                   │
//!        │                                   ▼ BlockingPool
//!        │                       ┌───────────┴────────────┐
//!        │                       ▼                        ▼
//!        │                 TokenRefresher            ConsentFlow
//!        │                  (OAuthClient)       (LoopbackConsentFlow)
//!        ▼
//!   CalendarClient ──POST /calendars/primary/events──▶ Google Calendar API
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use concierge_google::{CredentialManager, ManagerConfig};
//! use concierge_google::calendar::{CalendarClient, CalendarTool, EventRequest};
//!
//! let manager = Arc::new(CredentialManager::new(ManagerConfig::new("credentials.json", "token.json"))?);
//! let tool = CalendarTool::new(manager, CalendarClient::default());
//! let message = tool.add_event(&EventRequest::new("Dentist", "2025-04-16T15:00:00")).await;
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod handle;
pub mod manager;
pub mod oauth;
pub mod pool;
pub mod secret;
pub mod tokens;

pub use config::{CalendarConfig, ManagerConfig, PersistFailurePolicy};
pub use error::{AcquireFailure, AuthError, AuthErrorCode, AuthResult};
pub use handle::AuthorizedClient;
pub use manager::{
    Acquisition, ConsentFlow, CredentialManager, CredentialStatus, StoredCredential,
    TokenRefresher,
};
pub use oauth::{LoopbackConsentFlow, OAuthClient, PkceFlow};
pub use pool::BlockingPool;
pub use secret::ClientSecret;
pub use tokens::{CredentialRecord, RecordState, RefreshedToken, TokenStore};
