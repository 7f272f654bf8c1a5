//! Configuration commands.

use std::path::Path;

use concierge_google::ClientSecret;

use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &AppConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &AppConfig) -> ClientResult<()> {
    let manager = config.manager_config().map_err(ClientError::Config)?;
    config.calendar_config().map_err(ClientError::Config)?;
    config.tracing_config(false).map_err(ClientError::Config)?;

    if manager.client_secret_path.is_file() {
        let secret = ClientSecret::from_file(&manager.client_secret_path)
            .map_err(|e| ClientError::Config(format!("invalid client secret: {}", e.message())))?;
        secret
            .validate()
            .map_err(|e| ClientError::Config(format!("invalid client secret: {}", e)))?;
        println!("Client secret is valid.");
    } else {
        println!(
            "Client secret file does not exist yet: {}",
            manager.client_secret_path.display()
        );
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}
