//! OAuth 2.0 token endpoint client and loopback consent flow.
//!
//! [`OAuthClient`] talks to the token endpoint named in the client secret:
//! refresh exchanges and authorization code exchanges. [`LoopbackConsentFlow`]
//! runs the interactive Authorization Code flow with PKCE, using a loopback
//! redirect as installed applications do.
//!
//! Everything here blocks. The credential manager runs it on its
//! [`BlockingPool`](crate::pool::BlockingPool).
//!
//! # Consent flow
//!
//! 1. Generate a code verifier, its SHA-256 challenge and a random state
//! 2. Bind a listener on 127.0.0.1
//! 3. Open the browser on the provider's consent page
//! 4. Wait for the redirect carrying the authorization code
//! 5. Check the state and exchange the code (with the verifier) for tokens

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::handle::USER_AGENT;
use crate::manager::{ConsentFlow, TokenRefresher};
use crate::secret::ClientSecret;
use crate::tokens::{CredentialRecord, RefreshedToken};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Seconds shaved off the provider's `expires_in` so a token is refreshed
/// slightly before the provider stops accepting it.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// How often a timed callback wait checks for a connection.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long a connected browser gets to send its request line.
const CALLBACK_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the provider's token endpoint.
///
/// Holds no connection state: a blocking HTTP client is created for every
/// exchange and dropped on the same thread.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    timeout: Duration,
}

impl OAuthClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns a refresh error if the provider rejects the grant, a network
    /// error if it cannot be reached, and an invalid response error if its
    /// answer cannot be parsed.
    pub fn refresh_token(
        &self,
        secret: &ClientSecret,
        refresh_token: &str,
    ) -> AuthResult<RefreshedToken> {
        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.post_token(secret, &params, "token refresh", AuthError::refresh)?;
        info!("successfully refreshed access token");

        Ok(RefreshedToken {
            expiry: response.expiry(),
            scopes: response.granted_scopes(),
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            access_token: response.access_token,
        })
    }

    /// Exchanges an authorization code for a full credential record.
    ///
    /// When the provider does not report granted scopes, the requested
    /// scopes are recorded.
    pub fn exchange_code(
        &self,
        secret: &ClientSecret,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> AuthResult<CredentialRecord> {
        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.post_token(
            secret,
            &params,
            "token exchange",
            AuthError::authorization,
        )?;
        info!("successfully obtained tokens");

        let expiry = response.expiry();
        let granted = response.granted_scopes();
        let mut record = CredentialRecord::new(
            response.access_token,
            response.refresh_token,
            expiry,
            scopes.iter().cloned(),
        );
        if let Some(granted) = granted {
            record.scopes = granted;
        }
        if let Some(token_type) = response.token_type {
            record.token_type = token_type;
        }
        Ok(record)
    }

    /// Posts a form to the token endpoint and decodes the answer.
    ///
    /// `rejected` builds the error for a non-success status.
    fn post_token(
        &self,
        secret: &ClientSecret,
        params: &[(&str, &str)],
        what: &str,
        rejected: fn(String) -> AuthError,
    ) -> AuthResult<TokenResponse> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AuthError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;

        debug!("{} request to {}", what, secret.token_uri);
        let response = client
            .post(&secret.token_uri)
            .form(params)
            .send()
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("{} request timed out", what)
                } else {
                    format!("{} request failed: {}", what, e)
                };
                AuthError::network(message).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            AuthError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.to_string())
                .unwrap_or(body);
            return Err(rejected(format!("{} failed ({}): {}", what, status, detail))
                .with_status(status.as_u16()));
        }

        serde_json::from_str(&body).map_err(|e| {
            AuthError::invalid_response(format!("invalid token response: {}", e)).with_source(e)
        })
    }
}

impl TokenRefresher for OAuthClient {
    fn refresh(&self, secret: &ClientSecret, refresh_token: &str) -> AuthResult<RefreshedToken> {
        self.refresh_token(secret, refresh_token)
    }
}

/// Interactive consent through the system browser and a loopback redirect.
#[derive(Debug, Clone)]
pub struct LoopbackConsentFlow {
    oauth: OAuthClient,
    port_range: (u16, u16),
    callback_timeout: Option<Duration>,
    open_browser: bool,
}

impl LoopbackConsentFlow {
    /// Creates a flow that exchanges codes through `oauth` and listens on
    /// the first free port in `port_range`.
    pub fn new(oauth: OAuthClient, port_range: (u16, u16)) -> Self {
        Self {
            oauth,
            port_range,
            callback_timeout: None,
            open_browser: true,
        }
    }

    /// Bounds the wait for the redirect. `None` waits forever.
    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Controls whether the browser is launched; the URL is always printed.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Tries to bind a TCP listener on an available port in the given range.
    ///
    /// A range of `(0, 0)` lets the operating system choose.
    fn bind_loopback_server(port_range: (u16, u16)) -> AuthResult<(TcpListener, u16)> {
        for port in port_range.0..=port_range.1 {
            let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) else {
                continue;
            };
            let port = listener
                .local_addr()
                .map_err(|e| {
                    AuthError::internal(format!("failed to read listener address: {}", e))
                        .with_source(e)
                })?
                .port();
            debug!("bound loopback server on port {}", port);
            return Ok((listener, port));
        }
        Err(AuthError::configuration(format!(
            "no available port in range {}-{}",
            port_range.0, port_range.1
        )))
    }

    /// Waits for the OAuth callback and extracts the code and state.
    ///
    /// With a timeout the listener is polled until the deadline; the
    /// listener is dropped, and its port released, whichever way this returns.
    fn wait_for_callback(
        listener: TcpListener,
        timeout: Option<Duration>,
    ) -> AuthResult<(String, String)> {
        let deadline = timeout.map(|t| Instant::now() + t);
        if deadline.is_some() {
            listener.set_nonblocking(true).map_err(|e| {
                AuthError::internal(format!("failed to configure callback listener: {}", e))
                    .with_source(e)
            })?;
        }

        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    let _ = stream.set_nonblocking(false);
                    let _ = stream.set_read_timeout(Some(CALLBACK_READ_TIMEOUT));
                    if let Some(result) = Self::handle_callback(stream) {
                        return result;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if let (Some(deadline), Some(timeout)) = (deadline, timeout)
                        && Instant::now() >= deadline
                    {
                        return Err(AuthError::authorization(format!(
                            "no authorization callback within {:?}",
                            timeout
                        )));
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handles one request on the callback server.
    ///
    /// Returns `None` for requests that are not the redirect (favicon
    /// fetches and the like) so the server keeps listening.
    fn handle_callback(mut stream: TcpStream) -> Option<AuthResult<(String, String)>> {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();

        if reader.read_line(&mut request_line).is_err() {
            return None;
        }

        // GET /callback?code=...&state=... HTTP/1.1
        let mut parts = request_line.split_whitespace();
        let (Some("GET"), Some(path)) = (parts.next(), parts.next()) else {
            return None;
        };
        if !path.starts_with("/callback") {
            return None;
        }

        let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");

        let mut code = None;
        let mut state = None;
        let mut error = None;

        for param in query.split('&') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_default();
            match key {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                _ => {}
            }
        }

        let response = if error.is_some() || code.is_none() {
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
            <html><body><h1>Authorization Failed</h1>\
            <p>You can close this window.</p></body></html>"
        } else {
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
            <html><body><h1>Authorization Successful</h1>\
            <p>You can close this window and return to the assistant.</p></body></html>"
        };

        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();

        if let Some(error) = error {
            return Some(Err(AuthError::authorization(format!(
                "authorization denied: {}",
                error
            ))));
        }

        match code {
            Some(code) => Some(Ok((code, state.unwrap_or_default()))),
            None => Some(Err(AuthError::authorization(
                "missing authorization code in callback",
            ))),
        }
    }
}

impl ConsentFlow for LoopbackConsentFlow {
    fn authorize(&self, secret: &ClientSecret, scopes: &[String]) -> AuthResult<CredentialRecord> {
        let pkce = PkceFlow::new();

        let (listener, port) = Self::bind_loopback_server(self.port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let auth_url = pkce.build_auth_url(&secret.auth_uri, &secret.client_id, &redirect_uri, scopes);

        info!("starting interactive authorization on port {}", port);
        debug!("authorization URL: {}", auth_url);

        eprintln!("\nPlease authorize calendar access in your browser:\n\n{}\n", auth_url);
        if self.open_browser
            && let Err(e) = open::that(&auth_url)
        {
            warn!("failed to open browser: {}", e);
        }

        let (code, received_state) = Self::wait_for_callback(listener, self.callback_timeout)?;

        if received_state != pkce.state {
            return Err(AuthError::authorization(
                "OAuth state mismatch, possible CSRF attempt",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.oauth
            .exchange_code(secret, &code, &pkce.verifier, &redirect_uri, scopes)
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the authorization URL for the provider's consent page.
    ///
    /// Requests offline access and forces the consent prompt so the
    /// provider always issues a refresh token.
    pub fn build_auth_url(
        &self,
        auth_uri: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_uri,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn expiry(&self) -> Option<chrono::DateTime<Utc>> {
        self.expires_in.map(|secs| {
            let margin = EXPIRY_MARGIN_SECS.min(secs / 2);
            Utc::now() + chrono::Duration::seconds((secs - margin).max(0))
        })
    }

    fn granted_scopes(&self) -> Option<std::collections::BTreeSet<String>> {
        self.scope
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.split_whitespace().map(String::from).collect())
    }
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl std::fmt::Display for TokenErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthErrorCode;
    use crate::test_support::serve_once;
    use std::io::Read;

    fn secret_for(token_uri: &str) -> ClientSecret {
        ClientSecret::new("test-id.apps.googleusercontent.com", "test-secret").with_token_uri(token_uri)
    }

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // Base64 encoding of 32 bytes = 43 characters (no padding)
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636, appendix B
        let challenge = PkceFlow::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn pkce_values_are_random() {
        let flow1 = PkceFlow::new();
        let flow2 = PkceFlow::new();
        assert_ne!(flow1.challenge, flow2.challenge);
        assert_ne!(flow1.state, flow2.state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            crate::secret::GOOGLE_AUTH_URI,
            "test-client.apps.googleusercontent.com",
            "http://127.0.0.1:8080/callback",
            &["https://www.googleapis.com/auth/calendar".to_string()],
        );

        assert!(url.starts_with(crate::secret::GOOGLE_AUTH_URI));
        assert!(url.contains("client_id=test-client.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", urlencoding::encode(&flow.state))));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn binds_any_port() {
        let (listener, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        assert_ne!(port, 0);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn bind_fails_when_range_taken() {
        let (_held, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        let err = LoopbackConsentFlow::bind_loopback_server((port, port)).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::Configuration);
    }

    fn send_request(port: u16, request: &'static str) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream.write_all(request.as_bytes()).unwrap();
            let mut response = String::new();
            let _ = stream.read_to_string(&mut response);
            response
        })
    }

    #[test]
    fn callback_extracts_code_and_state() {
        let (listener, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        let client = send_request(
            port,
            "GET /callback?state=st%2Fate&code=4%2F0Ab&scope=x HTTP/1.1\r\nHost: localhost\r\n\r\n",
        );

        let result =
            LoopbackConsentFlow::wait_for_callback(listener, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(result, ("4/0Ab".to_string(), "st/ate".to_string()));
        assert!(client.join().unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn callback_ignores_unrelated_requests() {
        let (listener, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        let favicon = send_request(port, "GET /favicon.ico HTTP/1.1\r\n\r\n");
        let client = send_request(port, "GET /callback?code=abc&state=s HTTP/1.1\r\n\r\n");

        let (code, _) =
            LoopbackConsentFlow::wait_for_callback(listener, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(code, "abc");
        client.join().unwrap();
        favicon.join().unwrap();
    }

    #[test]
    fn callback_reports_denial() {
        let (listener, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        let client = send_request(port, "GET /callback?error=access_denied HTTP/1.1\r\n\r\n");

        let err = LoopbackConsentFlow::wait_for_callback(listener, Some(Duration::from_secs(5)))
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::Authorization);
        assert!(err.message().contains("access_denied"));
        assert!(client.join().unwrap().starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn callback_wait_times_out() {
        let (listener, _) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        let err = LoopbackConsentFlow::wait_for_callback(listener, Some(Duration::from_millis(50)))
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::Authorization);
        assert_eq!(err.message(), "no authorization callback within 50ms");
    }

    #[test]
    fn timed_out_wait_releases_port() {
        let (listener, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        LoopbackConsentFlow::wait_for_callback(listener, Some(Duration::from_millis(50)))
            .unwrap_err();

        let (_rebound, rebound_port) =
            LoopbackConsentFlow::bind_loopback_server((port, port)).unwrap();
        assert_eq!(rebound_port, port);
    }

    #[test]
    fn short_lived_tokens_are_not_born_expired() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","expires_in":30}"#).unwrap();
        let expiry = response.expiry().unwrap();
        assert!(expiry > Utc::now());
        assert!(expiry <= Utc::now() + chrono::Duration::seconds(30));

        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","expires_in":3600}"#).unwrap();
        let expiry = response.expiry().unwrap();
        assert!(expiry <= Utc::now() + chrono::Duration::seconds(3540));
        assert!(expiry > Utc::now() + chrono::Duration::seconds(3500));
    }

    #[test]
    fn refresh_against_token_endpoint() {
        let (url, server) = serve_once(
            200,
            r#"{"access_token":"B","expires_in":3600,"token_type":"Bearer","scope":"https://www.googleapis.com/auth/calendar"}"#,
        );

        let before = Utc::now();
        let refreshed = OAuthClient::new(Duration::from_secs(5))
            .refresh_token(&secret_for(&format!("{}/token", url)), "R")
            .unwrap();

        assert_eq!(refreshed.access_token, "B");
        assert!(refreshed.refresh_token.is_none());
        let expiry = refreshed.expiry.unwrap();
        assert!(expiry > before + chrono::Duration::seconds(3500));
        assert!(expiry <= Utc::now() + chrono::Duration::seconds(3600));
        assert!(
            refreshed
                .scopes
                .unwrap()
                .contains("https://www.googleapis.com/auth/calendar")
        );

        let request = server.join().unwrap();
        assert!(request.request_line.starts_with("POST /token"));
        assert!(request.body.contains("grant_type=refresh_token"));
        assert!(request.body.contains("refresh_token=R"));
        assert!(request.body.contains("client_secret=test-secret"));
    }

    #[test]
    fn refresh_rejection_is_refresh_error() {
        let (url, server) = serve_once(
            400,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        );

        let err = OAuthClient::new(Duration::from_secs(5))
            .refresh_token(&secret_for(&format!("{}/token", url)), "R")
            .unwrap_err();

        assert_eq!(err.code(), AuthErrorCode::Refresh);
        assert_eq!(err.status(), Some(400));
        assert!(err.message().contains("invalid_grant: Token has been expired or revoked."));
        server.join().unwrap();
    }

    #[test]
    fn refresh_with_garbage_response() {
        let (url, server) = serve_once(200, "<html>oops</html>");
        let err = OAuthClient::new(Duration::from_secs(5))
            .refresh_token(&secret_for(&format!("{}/token", url)), "R")
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::InvalidResponse);
        server.join().unwrap();
    }

    #[test]
    fn refresh_unreachable_endpoint_is_network_error() {
        let (listener, port) = LoopbackConsentFlow::bind_loopback_server((0, 0)).unwrap();
        drop(listener);
        let err = OAuthClient::new(Duration::from_secs(2))
            .refresh_token(&secret_for(&format!("http://127.0.0.1:{}/token", port)), "R")
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::Network);
    }

    #[test]
    fn exchange_code_builds_record() {
        let (url, server) = serve_once(
            200,
            r#"{"access_token":"A","refresh_token":"R","expires_in":3599,"token_type":"Bearer"}"#,
        );
        let scopes = vec!["https://www.googleapis.com/auth/calendar".to_string()];

        let record = OAuthClient::new(Duration::from_secs(5))
            .exchange_code(
                &secret_for(&format!("{}/token", url)),
                "code",
                "verifier",
                "http://127.0.0.1:1/callback",
                &scopes,
            )
            .unwrap();

        assert_eq!(record.access_token, "A");
        assert_eq!(record.refresh_token.as_deref(), Some("R"));
        assert!(record.has_scopes(&scopes));
        assert!(record.is_valid());

        let request = server.join().unwrap();
        assert!(request.body.contains("grant_type=authorization_code"));
        assert!(request.body.contains("code_verifier=verifier"));
    }

    #[test]
    fn exchange_rejection_is_authorization_error() {
        let (url, server) = serve_once(400, r#"{"error":"invalid_request"}"#);
        let err = OAuthClient::new(Duration::from_secs(5))
            .exchange_code(&secret_for(&format!("{}/token", url)), "c", "v", "r", &[])
            .unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::Authorization);
        server.join().unwrap();
    }
}
