//! Calendar event commands.

use std::sync::Arc;

use concierge_google::calendar::{CalendarClient, CalendarTool, EventRequest};

use crate::commands::token::build_manager;
use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};

/// Adds an event and prints the tool's result.
pub async fn add(config: &AppConfig, request: EventRequest) -> ClientResult<()> {
    let manager = Arc::new(build_manager(config)?);
    let client = CalendarClient::new(config.calendar_config().map_err(ClientError::Config)?);
    let tool = CalendarTool::new(manager, client);

    let result = tool.add_event(&request).await;
    if result.starts_with("Error") {
        return Err(ClientError::Event(result));
    }
    println!("{}", result);
    Ok(())
}

/// Builds the tool input from command-line arguments.
pub fn request_from_args(
    summary: String,
    start: String,
    end: Option<String>,
    description: Option<String>,
    location: Option<String>,
) -> EventRequest {
    let mut request = EventRequest::new(summary, start);
    if let Some(end) = end {
        request = request.with_end(end);
    }
    if let Some(description) = description {
        request = request.with_description(description);
    }
    if let Some(location) = location {
        request = request.with_location(location);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_arguments_are_carried() {
        let request = request_from_args(
            "Standup".to_string(),
            "2025-04-16T09:00:00".to_string(),
            None,
            Some("daily".to_string()),
            None,
        );
        assert_eq!(request.summary, "Standup");
        assert!(request.end.is_none());
        assert_eq!(request.description.as_deref(), Some("daily"));
        assert!(request.location.is_none());
    }

    #[tokio::test]
    async fn authentication_failure_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.google.client_secret_file = Some(tmp.path().join("missing.json"));
        config.google.token_file = tmp.path().join("token.json");

        let err = add(&config, EventRequest::new("X", "2025-04-16"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Event(ref msg) if msg.contains("authenticate")));
    }
}
