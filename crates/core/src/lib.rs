//! `mediator-core` — message contracts, replay metadata and errors.
//!
//! This crate has no dispatch logic; it defines what flows through the mediator.

pub mod error;
pub mod id;
pub mod message;
pub mod replay_policy;

pub use error::{HandlerResult, MediatorError, MediatorResult, ResolveError};
pub use id::MessageId;
pub use message::{Command, Message, MessageKind, MessageType, Query};
pub use replay_policy::ReplayPolicy;
