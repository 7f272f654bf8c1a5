//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// concierge - personal assistant calendar integration
#[derive(Debug, Parser)]
#[command(name = "concierge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CONCIERGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that take precedence over the configuration file.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Path to the OAuth client secret JSON file
    #[arg(long, env = "GOOGLE_CLIENT_SECRET_FILE", global = true)]
    pub client_secret_file: Option<PathBuf>,

    /// Path to the token file
    #[arg(long, env = "GOOGLE_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Timezone attached to timed events
    #[arg(long, env = "CALENDAR_TIMEZONE", global = true)]
    pub timezone: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "LOG_LEVEL", global = true)]
    pub log_level: Option<String>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Obtain calendar credentials and save them to the token file
    Token {
        /// Discard stored credentials and authorize again
        #[arg(long, short)]
        force: bool,
    },

    /// Show credential status without contacting the provider
    Status,

    /// Calendar event commands
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Event actions.
#[derive(Debug, Subcommand)]
pub enum EventAction {
    /// Add an event to the primary calendar
    Add {
        /// Event title
        #[arg(long)]
        summary: String,

        /// Start: YYYY-MM-DD for an all-day event, or an ISO datetime
        #[arg(long)]
        start: String,

        /// End, in the same form as the start
        #[arg(long)]
        end: Option<String>,

        /// Event description
        #[arg(long)]
        description: Option<String>,

        /// Event location
        #[arg(long)]
        location: Option<String>,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
