//! concierge CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use concierge_cli::cli::{Cli, Command, ConfigAction, EventAction};
use concierge_cli::commands;
use concierge_cli::config::AppConfig;
use concierge_cli::error::{ClientError, ClientResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = if cli.config.is_some() {
        AppConfig::load_from(&config_path).map_err(ClientError::Config)?
    } else {
        AppConfig::load().map_err(ClientError::Config)?
    };
    config.apply_overrides(&cli.overrides);

    // Initialize tracing; the guard flushes the log file on drop
    let tracing_config = config
        .tracing_config(cli.debug)
        .map_err(ClientError::Config)?;
    let _log_guard = concierge_core::init_tracing(tracing_config)?;
    debug!(config = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Token { force } => commands::token::run(&config, force).await,
        Command::Status => commands::token::status(&config),
        Command::Event { action } => match action {
            EventAction::Add {
                summary,
                start,
                end,
                description,
                location,
            } => {
                let request =
                    commands::event::request_from_args(summary, start, end, description, location);
                commands::event::add(&config, request).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
