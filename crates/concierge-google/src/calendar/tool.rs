//! The `add_calendar_event` tool.
//!
//! Tool results are plain strings meant for a language model, so every
//! outcome, including failures, is reported as text rather than an error.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::calendar::client::CalendarClient;
use crate::calendar::event::{EventBody, EventRequest};
use crate::manager::CredentialManager;

/// Returned when no authorized client could be obtained.
pub const AUTH_FAILURE_MESSAGE: &str =
    "Error: Failed to authenticate Google Calendar service. Check logs and configuration.";

/// Creates calendar events on behalf of the assistant.
#[derive(Debug, Clone)]
pub struct CalendarTool {
    manager: Arc<CredentialManager>,
    client: CalendarClient,
}

impl CalendarTool {
    /// Creates a tool backed by `manager` for credentials and `client` for
    /// API calls.
    pub fn new(manager: Arc<CredentialManager>, client: CalendarClient) -> Self {
        Self { manager, client }
    }

    /// Returns the credential manager.
    pub fn manager(&self) -> &Arc<CredentialManager> {
        &self.manager
    }

    /// Adds an event to the calendar and describes the outcome.
    pub async fn add_event(&self, request: &EventRequest) -> String {
        let acquisition = self.manager.acquire_handle().await;
        let Some(handle) = acquisition.handle() else {
            if let Some(failure) = acquisition.failure() {
                error!("cannot add event '{}': {}", request.summary, failure);
            }
            return AUTH_FAILURE_MESSAGE.to_string();
        };

        let body = match EventBody::from_request(request, &self.client.config().timezone) {
            Ok(body) => body,
            Err(e) => {
                warn!("{}", e);
                return format!("Error: {}", e);
            }
        };

        match self.client.insert_event(handle, &body).await {
            Ok(created) => {
                info!(event_id = %created.id, "created event '{}'", request.summary);
                format!(
                    "Event '{}' created successfully. View it here: {}",
                    request.summary,
                    created.html_link.as_deref().unwrap_or("N/A")
                )
            }
            Err(e) => {
                error!("failed to add event '{}': {}", request.summary, e);
                if e.is_unauthorized() {
                    self.manager.invalidate().await;
                }
                format!(
                    "Error adding Google Calendar event '{}': {}",
                    request.summary,
                    e.message()
                )
            }
        }
    }
}
