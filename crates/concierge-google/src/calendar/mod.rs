//! Calendar event creation on top of the credential manager.
//!
//! - [`EventRequest`] / [`EventBody`] - tool input and the API payload built from it
//! - [`CalendarClient`] - `events.insert` over an authorized client
//! - [`CalendarTool`] - the `add_calendar_event` tool

pub mod client;
pub mod event;
pub mod tool;

pub use client::{CalendarClient, CreatedEvent};
pub use event::{EventBody, EventDateTime, EventInputError, EventRequest};
pub use tool::{AUTH_FAILURE_MESSAGE, CalendarTool};
