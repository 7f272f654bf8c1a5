//! Authorized client handle.

use std::fmt;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};
use crate::tokens::CredentialRecord;

/// User agent sent with every provider request.
pub(crate) const USER_AGENT: &str = concat!("concierge/", env!("CARGO_PKG_VERSION"));

/// An HTTP client bound to one valid credential record.
///
/// Shared between callers through `Arc`; never persisted.
pub struct AuthorizedClient {
    http: reqwest::Client,
    record: CredentialRecord,
}

impl AuthorizedClient {
    /// Builds a client for the given record.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the HTTP client cannot be constructed
    /// (for example when the TLS backend fails to initialize).
    pub fn build(record: CredentialRecord, timeout: Duration) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AuthError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;
        Ok(Self { http, record })
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the credential record this client is bound to.
    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }

    /// Returns the bearer access token.
    pub fn access_token(&self) -> &str {
        &self.record.access_token
    }

    /// Returns true while the bound access token has not expired.
    pub fn is_valid(&self) -> bool {
        self.record.is_valid()
    }

    /// Returns the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.record.token_type, self.record.access_token)
    }
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("expiry", &self.record.expiry)
            .field("scopes", &self.record.scopes)
            .finish_non_exhaustive()
    }
}
