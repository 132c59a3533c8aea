//! Mediator error model.

use thiserror::Error;

/// Result type used across the mediator.
pub type MediatorResult<T> = Result<T, MediatorError>;

/// Result type returned by command and query handlers.
///
/// Handler failures are application-specific, so they travel as `anyhow::Error`
/// and are surfaced unchanged through [`MediatorError::Invocation`].
pub type HandlerResult<T> = anyhow::Result<T>;

/// Failure raised while dispatching, registering or replaying messages.
///
/// The mediator performs no local recovery: every variant surfaces to the
/// direct caller of `dispatch`/`emit`/`replay`.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// No handler is bound for the message type (or query/result pair).
    #[error("handler for {message_type} not found")]
    HandlerNotFound { message_type: String },

    /// The service container could not construct the bound handler.
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// The handler itself failed.
    #[error(transparent)]
    Invocation(anyhow::Error),

    /// Two handlers were registered for the same message type.
    #[error("duplicate handler for {message_type}: {attempted} conflicts with {existing}")]
    DuplicateHandler {
        message_type: String,
        existing: &'static str,
        attempted: &'static str,
    },

    /// A type-erased payload did not match the type it was dispatched under.
    #[error("message type mismatch: expected {expected}, found {found}")]
    MessageTypeMismatch { expected: &'static str, found: String },

    /// The event log lock was poisoned by a panicking writer.
    #[error("event log lock poisoned")]
    LogPoisoned,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MediatorError {
    pub fn handler_not_found(message_type: impl Into<String>) -> Self {
        Self::HandlerNotFound {
            message_type: message_type.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True when the failure is a missing binding rather than a handler or container fault.
    pub fn is_handler_not_found(&self) -> bool {
        matches!(self, Self::HandlerNotFound { .. })
    }
}

/// Failure raised by the service container.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No registration exists for the requested service type.
    #[error("service {service} is not registered")]
    NotRegistered { service: &'static str },

    /// A factory ran but could not build the service.
    #[error("failed to construct {service}: {reason}")]
    Construction { service: &'static str, reason: String },

    /// A container lock was poisoned.
    #[error("service container lock poisoned")]
    Poisoned,
}

impl ResolveError {
    pub fn not_registered<T: ?Sized>() -> Self {
        Self::NotRegistered {
            service: core::any::type_name::<T>(),
        }
    }

    pub fn construction<T: ?Sized>(reason: impl Into<String>) -> Self {
        Self::Construction {
            service: core::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}
