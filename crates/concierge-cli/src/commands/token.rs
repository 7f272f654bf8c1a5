//! Token generation and credential status.

use tracing::{info, warn};

use concierge_google::{CredentialManager, ManagerConfig, StoredCredential};

use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};

/// Builds a credential manager from the application configuration.
pub(crate) fn build_manager(config: &AppConfig) -> ClientResult<CredentialManager> {
    let manager_config = config.manager_config().map_err(ClientError::Config)?;
    Ok(CredentialManager::new(manager_config)?)
}

fn check_paths(config: &ManagerConfig) -> ClientResult<()> {
    if !config.client_secret_path.is_file() {
        return Err(ClientError::Config(format!(
            "client secret file not found: {}",
            config.client_secret_path.display()
        )));
    }
    Ok(())
}

/// Obtains credentials, running the browser consent flow if needed, and
/// saves them to the token file.
///
/// With `force`, stored credentials are discarded first.
pub async fn run(config: &AppConfig, force: bool) -> ClientResult<()> {
    let manager = build_manager(config)?;
    let store = manager.token_store();
    info!("using client secret: {}", manager.config().client_secret_path.display());
    info!("using token file: {}", store.path().display());
    check_paths(manager.config())?;

    if force && store.remove()? {
        info!("removed stored credentials");
    }

    let acquisition = manager.acquire_handle().await;
    if acquisition.is_success() {
        if store.exists() {
            println!("Credentials saved to {}", store.path().display());
        } else {
            warn!("credentials obtained but not saved to {}", store.path().display());
            println!("Credentials obtained but could not be saved.");
        }
        return Ok(());
    }

    if let Ok(Some(record)) = store.load()
        && !record.is_valid()
    {
        return Err(ClientError::AuthRequired(format!(
            "credentials exist but are invalid. Check {} or delete it and re-run",
            store.path().display()
        )));
    }

    match acquisition.into_result() {
        Ok(_) => Ok(()),
        Err(failure) => Err(failure.into()),
    }
}

/// Prints the credential state without contacting the provider.
pub fn status(config: &AppConfig) -> ClientResult<()> {
    let manager = build_manager(config)?;
    let status = manager.status();
    let manager_config = manager.config();

    println!(
        "client secret: {} ({})",
        manager_config.client_secret_path.display(),
        if status.client_secret_present {
            "present"
        } else {
            "missing"
        }
    );
    println!(
        "token file:    {} ({})",
        manager.token_store().path().display(),
        describe(&status.stored)
    );
    println!("scopes:        {}", manager_config.scopes.join(" "));
    Ok(())
}

fn describe(stored: &StoredCredential) -> String {
    match stored {
        StoredCredential::Absent => "absent".to_string(),
        StoredCredential::Valid { expiry: Some(at) } => {
            format!("valid until {}", at.format("%Y-%m-%d %H:%M:%S UTC"))
        }
        StoredCredential::Valid { expiry: None } => "valid".to_string(),
        StoredCredential::Refreshable => "expired, refreshable".to_string(),
        StoredCredential::Unusable => "unusable, run `concierge token`".to_string(),
        StoredCredential::Unreadable(reason) => format!("unreadable: {}", reason),
    }
}
