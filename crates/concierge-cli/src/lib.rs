//! The `concierge` command-line interface.
//!
//! Generates and inspects Google Calendar credentials, adds calendar events
//! and manages the configuration file.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
