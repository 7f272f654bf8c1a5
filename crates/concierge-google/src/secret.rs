//! Provider-issued OAuth client descriptor.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Google's OAuth authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client identity read from the provider's client secret file.
///
/// Never mutated; loaded once per authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecret {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
    /// Authorization endpoint.
    pub auth_uri: String,
    /// Token endpoint used for code exchange and refresh.
    pub token_uri: String,
}

/// Structure of Google's client secret JSON file.
///
/// Supports the Cloud Console layout with an `installed` or `web` section,
/// and a flat layout with the fields at root level (as written by gcloud).
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<Section>,
    web: Option<Section>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Section {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecret {
    /// Creates a descriptor pointing at Google's endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        }
    }

    /// Overrides the token endpoint.
    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = uri.into();
        self
    }

    /// Loads the descriptor from a client secret JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::configuration(format!(
                "failed to read client secret file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses the descriptor from its JSON form.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            AuthError::configuration(format!("failed to parse client secret JSON: {}", e))
        })?;

        let (client_id, client_secret, auth_uri, token_uri) =
            if let Some(section) = file.installed.or(file.web) {
                (
                    section.client_id,
                    section.client_secret,
                    section.auth_uri,
                    section.token_uri,
                )
            } else if let (Some(id), Some(secret)) = (file.client_id, file.client_secret) {
                (id, secret, file.auth_uri, file.token_uri)
            } else {
                return Err(AuthError::configuration(
                    "client secret file must contain an 'installed'/'web' section or \
                     'client_id'/'client_secret' at root level",
                ));
            };

        let mut secret = Self::new(client_id, client_secret);
        if let Some(uri) = auth_uri {
            secret.auth_uri = uri;
        }
        if let Some(uri) = token_uri {
            secret.token_uri = uri;
        }
        Ok(secret)
    }

    /// Validates that the descriptor looks usable.
    ///
    /// Checks that the client ID and secret are non-empty, that both
    /// endpoints are absolute URLs, and that the client ID has the shape
    /// Google issues (`*.apps.googleusercontent.com`).
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("client_id is required".to_string());
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com".to_string());
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required".to_string());
        }
        for (name, uri) in [("auth_uri", &self.auth_uri), ("token_uri", &self.token_uri)] {
            Url::parse(uri).map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
        }
        Ok(())
    }
}
