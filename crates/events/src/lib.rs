//! Handler capabilities and the event log.

pub mod handler;
pub mod log;

pub use handler::{CommandHandler, QueryHandler};
pub use log::{EventLog, LoggedMessage, LoggedPayload};
