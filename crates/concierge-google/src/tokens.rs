//! OAuth credential records and their on-disk store.
//!
//! The store holds exactly one [`CredentialRecord`] as JSON and is rewritten
//! wholesale on every change. The record format also accepts the field names
//! written by Google's Python `google-auth` library (`token` for the access
//! token), so an existing `token.json` keeps working.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// An OAuth2 token bundle for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The access token for API requests.
    #[serde(alias = "token")]
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token expires. `None` means it does not expire.
    #[serde(default, alias = "expires_at")]
    pub expiry: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Token type, used as the `Authorization` scheme.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

/// How usable a record is right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// The access token can be used as-is.
    Valid,
    /// The access token is expired but a refresh token is present.
    Refreshable,
    /// Neither usable nor refreshable.
    Unusable,
}

impl CredentialRecord {
    /// Creates a new record.
    pub fn new<I, S>(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
        scopes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry,
            scopes: scopes.into_iter().map(Into::into).collect(),
            token_type: default_token_type(),
        }
    }

    /// Returns true if the access token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }

    /// Returns true if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the record holds a non-expired access token.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Returns true if the record carries a refresh token.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Classifies the record.
    pub fn state(&self) -> RecordState {
        if self.is_valid() {
            RecordState::Valid
        } else if self.is_refreshable() {
            RecordState::Refreshable
        } else {
            RecordState::Unusable
        }
    }

    /// Returns true if every scope in `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.contains(scope.as_ref()))
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expiry.map(|expiry| expiry - Utc::now())
    }

    /// Folds the result of a refresh exchange into this record.
    ///
    /// The refresh token is kept unless the provider rotated it; scopes are
    /// replaced only when the provider reports them.
    pub fn apply_refresh(&mut self, refreshed: RefreshedToken) {
        self.access_token = refreshed.access_token;
        self.expiry = refreshed.expiry;
        if let Some(refresh_token) = refreshed.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scopes) = refreshed.scopes {
            self.scopes = scopes;
        }
        if let Some(token_type) = refreshed.token_type {
            self.token_type = token_type;
        }
    }
}

/// What a refresh exchange returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The new access token.
    pub access_token: String,
    /// Expiry of the new access token.
    pub expiry: Option<DateTime<Utc>>,
    /// A rotated refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
    /// Granted scopes, if the provider reported them.
    pub scopes: Option<BTreeSet<String>>,
    /// Token type, if the provider reported it.
    pub token_type: Option<String>,
}

impl RefreshedToken {
    /// Creates a refresh result carrying only a token and its expiry.
    pub fn new(access_token: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expiry,
            refresh_token: None,
            scopes: None,
            token_type: None,
        }
    }
}

/// File-backed store for a single credential record.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never sees a partially written record.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a new store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the store file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the record from disk.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn load(&self) -> AuthResult<Option<CredentialRecord>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::persistence(format!("failed to read token file: {}", e)).with_source(e)
        })?;

        let record: CredentialRecord = serde_json::from_str(&content).map_err(|e| {
            AuthError::persistence(format!("failed to parse token file: {}", e)).with_source(e)
        })?;

        debug!("loaded credentials from {:?}", self.path);
        Ok(Some(record))
    }

    /// Writes the record to disk, replacing any previous one.
    pub fn save(&self, record: &CredentialRecord) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::persistence(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let temp_path = self.temp_path();
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| AuthError::internal(format!("failed to serialize credentials: {}", e)))?;

        fs::write(&temp_path, &content).map_err(|e| {
            AuthError::persistence(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            AuthError::persistence(format!("failed to replace token file: {}", e)).with_source(e)
        })?;

        debug!("saved credentials to {:?}", self.path);
        Ok(())
    }

    /// Deletes the store file.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    pub fn remove(&self) -> AuthResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| {
            AuthError::persistence(format!("failed to remove token file: {}", e)).with_source(e)
        })?;
        info!("removed token file {:?}", self.path);
        Ok(true)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

    fn record(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> CredentialRecord {
        CredentialRecord::new(
            "access-token",
            refresh.map(str::to_string),
            expiry,
            [CALENDAR_SCOPE],
        )
    }

    #[test]
    fn record_states() {
        let future = Some(Utc::now() + Duration::hours(1));
        let past = Some(Utc::now() - Duration::hours(1));

        assert_eq!(record(future, None).state(), RecordState::Valid);
        assert_eq!(record(None, None).state(), RecordState::Valid);
        assert_eq!(record(past, Some("r")).state(), RecordState::Refreshable);
        assert_eq!(record(past, None).state(), RecordState::Unusable);
        assert_eq!(record(past, Some("")).state(), RecordState::Unusable);

        let mut empty = record(future, Some("r"));
        empty.access_token.clear();
        assert_eq!(empty.state(), RecordState::Refreshable);
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        let rec = record(Some(now), None);
        assert!(rec.is_expired_at(now));
        assert!(!rec.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn scope_check() {
        let rec = CredentialRecord::new("a", None, None, ["scope1", "scope2"]);
        assert!(rec.has_scopes(&["scope1"]));
        assert!(rec.has_scopes(&["scope1", "scope2"]));
        assert!(!rec.has_scopes(&["scope3"]));
        assert!(rec.has_scopes::<&str>(&[]));
    }

    #[test]
    fn apply_refresh_keeps_refresh_token() {
        let mut rec = record(Some(Utc::now() - Duration::hours(1)), Some("R"));
        let expiry = Some(Utc::now() + Duration::hours(1));
        rec.apply_refresh(RefreshedToken::new("B", expiry));

        assert_eq!(rec.access_token, "B");
        assert_eq!(rec.expiry, expiry);
        assert_eq!(rec.refresh_token.as_deref(), Some("R"));
        assert!(rec.has_scopes(&[CALENDAR_SCOPE]));
    }

    #[test]
    fn apply_refresh_takes_rotated_values() {
        let mut rec = record(None, Some("R"));
        let mut refreshed = RefreshedToken::new("B", None);
        refreshed.refresh_token = Some("R2".to_string());
        refreshed.scopes = Some(BTreeSet::from(["other".to_string()]));
        rec.apply_refresh(refreshed);

        assert_eq!(rec.refresh_token.as_deref(), Some("R2"));
        assert!(rec.has_scopes(&["other"]));
        assert!(!rec.has_scopes(&[CALENDAR_SCOPE]));
    }

    #[test]
    fn store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        let rec = record(Some(Utc::now() + Duration::hours(1)), Some("R"));

        store.save(&rec).unwrap();
        assert!(store.exists());

        let loaded = TokenStore::new(store.path()).load().unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert!(!tmp.path().join("token.json.tmp").exists());
    }

    #[test]
    fn store_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
        assert!(!store.remove().unwrap());
    }

    #[test]
    fn store_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        store.save(&record(None, None)).unwrap();

        assert!(store.remove().unwrap());
        assert!(!store.exists());
    }

    #[test]
    fn store_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("nested/dir/token.json"));
        store.save(&record(None, None)).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn store_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        fs::write(&path, "{ not json").unwrap();

        let err = TokenStore::new(&path).load().unwrap_err();
        assert_eq!(err.code(), crate::AuthErrorCode::Persistence);
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn store_write_failure_is_persistence_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let err = TokenStore::new(blocker.join("token.json"))
            .save(&record(None, None))
            .unwrap_err();
        assert_eq!(err.code(), crate::AuthErrorCode::Persistence);
    }

    #[cfg(unix)]
    #[test]
    fn store_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        store.save(&record(None, None)).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn loads_google_auth_format() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/calendar"],
            "universe_domain": "googleapis.com",
            "expiry": "2025-04-16T10:00:00.123456Z"
        }"#;

        let rec: CredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.access_token, "ya29.a0");
        assert_eq!(rec.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(rec.token_type, "Bearer");
        assert!(rec.has_scopes(&[CALENDAR_SCOPE]));
        assert!(rec.is_expired());
        assert_eq!(rec.state(), RecordState::Refreshable);
    }
}
