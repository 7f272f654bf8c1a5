//! Shared plumbing: tracing setup and ISO date/time parsing for tool inputs.

pub mod time;
pub mod tracing;

pub use time::{Moment, TimeParseError};
pub use tracing::{LogGuard, TracingConfig, TracingError, TracingOutputFormat, init_tracing};
