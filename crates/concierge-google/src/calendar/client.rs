//! Google Calendar API client.

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use crate::calendar::event::EventBody;
use crate::config::CalendarConfig;
use crate::error::{AuthError, AuthResult};
use crate::handle::AuthorizedClient;

/// An event the API reported as created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    /// Event identifier.
    pub id: String,
    /// Link to the event in the Calendar web UI.
    #[serde(default)]
    pub html_link: Option<String>,
    /// Event status (`confirmed`, `tentative`, ...).
    #[serde(default)]
    pub status: Option<String>,
}

/// Inserts events through an [`AuthorizedClient`].
#[derive(Debug, Clone, Default)]
pub struct CalendarClient {
    config: CalendarConfig,
}

impl CalendarClient {
    /// Creates a client for the given configuration.
    pub fn new(config: CalendarConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.config.calendar_id)
        )
    }

    /// Inserts `event` into the configured calendar.
    ///
    /// # Errors
    ///
    /// Returns a network error if the API cannot be reached and a provider
    /// API error (carrying the HTTP status) if it rejects the request.
    pub async fn insert_event(
        &self,
        client: &AuthorizedClient,
        event: &EventBody,
    ) -> AuthResult<CreatedEvent> {
        let body = serde_json::to_string(event)
            .map_err(|e| AuthError::internal(format!("failed to serialize event: {}", e)))?;

        let url = self.events_url();
        debug!("inserting event into {}", url);

        let response = client
            .http()
            .post(&url)
            .bearer_auth(client.access_token())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                AuthError::network(message).with_source(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AuthError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            AuthError::invalid_response(format!("failed to parse response: {}", e)).with_source(e)
        })
    }
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

fn api_error(status: StatusCode, body: &str) -> AuthError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    let message = match status {
        StatusCode::UNAUTHORIZED => format!("access token rejected ({}): {}", status, detail),
        StatusCode::FORBIDDEN => format!("access denied to calendar ({}): {}", status, detail),
        _ => format!("API error ({}): {}", status, detail),
    };
    AuthError::provider_api(message).with_status(status.as_u16())
}
