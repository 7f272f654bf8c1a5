//! Application configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/concierge/config.toml` by default. Relative paths in the file
//! are resolved against the file's directory. Command-line flags and their
//! environment variables (`GOOGLE_CLIENT_SECRET_FILE`, `GOOGLE_TOKEN_FILE`,
//! `CALENDAR_TIMEZONE`, `LOG_LEVEL`) take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Level;

use concierge_core::{TracingConfig, TracingOutputFormat};
use concierge_google::{CalendarConfig, ManagerConfig, PersistFailurePolicy};

use crate::cli::Overrides;

// ---------------------------------------------------------------------------
// AppConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the concierge CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Google OAuth and Calendar settings.
    pub google: GoogleSettings,

    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Google OAuth and Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Path to the OAuth client secret JSON downloaded from the Cloud Console.
    pub client_secret_file: Option<PathBuf>,

    /// Path of the token file.
    pub token_file: PathBuf,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Timezone attached to timed events.
    pub calendar_timezone: String,

    /// Calendar receiving new events.
    pub calendar_id: String,

    /// Port range for the OAuth redirect listener; `[0, 0]` picks any port.
    pub loopback_port_range: (u16, u16),

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// How long to wait for the browser redirect; unset waits forever.
    pub consent_timeout_secs: Option<u64>,

    /// Maximum number of concurrent blocking credential jobs.
    pub worker_threads: usize,

    /// Open the browser automatically during authorization.
    pub open_browser: bool,

    /// What to do when credentials cannot be saved.
    pub persist_failure: PersistFailurePolicy,

    /// Calendar API base URL.
    pub api_base: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_secret_file: None,
            token_file: PathBuf::from("token.json"),
            scopes: vec![ManagerConfig::DEFAULT_SCOPE.to_string()],
            calendar_timezone: "UTC".to_string(),
            calendar_id: "primary".to_string(),
            loopback_port_range: (0, 0),
            timeout_secs: ManagerConfig::DEFAULT_TIMEOUT_SECS,
            consent_timeout_secs: None,
            worker_threads: ManagerConfig::DEFAULT_WORKER_THREADS,
            open_browser: true,
            persist_failure: PersistFailurePolicy::default(),
            api_base: CalendarConfig::DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    pub level: String,

    /// Console format: `compact`, `pretty` or `json`.
    pub format: String,

    /// Directory for daily-rotated log files; console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            directory: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("concierge")
    }

    /// Applies command-line and environment overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref path) = overrides.client_secret_file {
            self.google.client_secret_file = Some(path.clone());
        }
        if let Some(ref path) = overrides.token_file {
            self.google.token_file = path.clone();
        }
        if let Some(ref tz) = overrides.timezone {
            self.google.calendar_timezone = tz.clone();
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        if let Some(ref mut path) = self.google.client_secret_file {
            resolve(path);
        }
        resolve(&mut self.google.token_file);
        if let Some(ref mut path) = self.logging.directory {
            resolve(path);
        }
    }

    /// Builds the credential manager configuration.
    pub fn manager_config(&self) -> Result<ManagerConfig, String> {
        let google = &self.google;
        let secret = google.client_secret_file.as_ref().ok_or_else(|| {
            format!(
                "client secret file not configured. Set GOOGLE_CLIENT_SECRET_FILE or add to {}:\n  \
                 [google]\n  \
                 client_secret_file = \"credentials.json\"",
                Self::default_path().display()
            )
        })?;

        let mut config = ManagerConfig::new(secret, &google.token_file)
            .with_scopes(google.scopes.clone())
            .with_timeout(Duration::from_secs(google.timeout_secs))
            .with_loopback_port_range(google.loopback_port_range.0, google.loopback_port_range.1)
            .with_worker_threads(google.worker_threads)
            .with_open_browser(google.open_browser)
            .with_persist_failure(google.persist_failure);
        if let Some(secs) = google.consent_timeout_secs {
            config = config.with_consent_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds the calendar client configuration.
    pub fn calendar_config(&self) -> Result<CalendarConfig, String> {
        let config = CalendarConfig::default()
            .with_api_base(&self.google.api_base)
            .with_calendar_id(&self.google.calendar_id)
            .with_timezone(&self.google.calendar_timezone);
        config.validate()?;
        Ok(config)
    }

    /// Builds the tracing configuration. `debug` forces debug output.
    pub fn tracing_config(&self, debug: bool) -> Result<TracingConfig, String> {
        let mut config = if debug {
            TracingConfig::cli_debug()
        } else {
            let level: Level = self
                .logging
                .level
                .parse()
                .map_err(|_| format!("invalid log level '{}'", self.logging.level))?;
            let format = TracingOutputFormat::from_name(&self.logging.format)
                .ok_or_else(|| format!("invalid log format '{}'", self.logging.format))?;
            TracingConfig::default().with_level(level).with_format(format)
        };

        if let Some(ref dir) = self.logging.directory {
            config = config.with_log_directory(dir);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert!(config.google.client_secret_file.is_none());
        assert_eq!(config.google.token_file, PathBuf::from("token.json"));
        assert_eq!(config.google.calendar_timezone, "UTC");
        assert_eq!(
            config.google.scopes,
            vec!["https://www.googleapis.com/auth/calendar".to_string()]
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parses_toml() {
        let toml_content = r#"
[google]
client_secret_file = "/etc/concierge/credentials.json"
token_file = "/var/lib/concierge/token.json"
calendar_timezone = "Europe/Paris"
loopback_port_range = [8080, 8090]
consent_timeout_secs = 300
persist_failure = "fail"

[logging]
level = "debug"
format = "json"
"#;
        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(
            config.google.client_secret_file,
            Some(PathBuf::from("/etc/concierge/credentials.json"))
        );
        assert_eq!(config.google.loopback_port_range, (8080, 8090));
        assert_eq!(config.google.persist_failure, PersistFailurePolicy::Fail);
        assert_eq!(config.google.worker_threads, 4);

        let manager = config.manager_config().unwrap();
        assert_eq!(manager.consent_timeout, Some(Duration::from_secs(300)));
        assert_eq!(manager.loopback_port_range, (8080, 8090));
        assert_eq!(manager.persist_failure, PersistFailurePolicy::Fail);

        let calendar = config.calendar_config().unwrap();
        assert_eq!(calendar.timezone, "Europe/Paris");

        let tracing = config.tracing_config(false).unwrap();
        assert_eq!(tracing.default_level, Level::DEBUG);
        assert_eq!(tracing.output_format, TracingOutputFormat::Json);
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[google]\nclient_secret_file = \"credentials.json\"\ntoken_file = \"/abs/token.json\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(
            config.google.client_secret_file,
            Some(tmp.path().join("credentials.json"))
        );
        assert_eq!(config.google.token_file, PathBuf::from("/abs/token.json"));
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[google\n").unwrap();
        assert!(AppConfig::load_from(&path).unwrap_err().contains("failed to parse"));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = AppConfig::default();
        config.apply_overrides(&Overrides {
            client_secret_file: Some(PathBuf::from("secret.json")),
            token_file: Some(PathBuf::from("other.json")),
            timezone: Some("Asia/Tokyo".to_string()),
            log_level: Some("warn".to_string()),
        });

        assert_eq!(
            config.google.client_secret_file,
            Some(PathBuf::from("secret.json"))
        );
        assert_eq!(config.google.token_file, PathBuf::from("other.json"));
        assert_eq!(config.google.calendar_timezone, "Asia/Tokyo");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn missing_client_secret_is_reported() {
        let err = AppConfig::default().manager_config().unwrap_err();
        assert!(err.contains("GOOGLE_CLIENT_SECRET_FILE"));
    }

    #[test]
    fn invalid_logging_settings() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.tracing_config(false).is_err());
        assert!(config.tracing_config(true).is_ok());

        config.logging.level = "info".to_string();
        config.logging.format = "xml".to_string();
        assert!(config.tracing_config(false).is_err());
    }

    #[test]
    fn dump_round_trips() {
        let config = AppConfig::default();
        let dumped = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&dumped).unwrap();
        assert_eq!(parsed.google.token_file, config.google.token_file);
        assert_eq!(parsed.google.api_base, config.google.api_base);
    }
}
