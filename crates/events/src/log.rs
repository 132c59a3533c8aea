//! Append-only, in-memory log of emitted messages.
//!
//! The log is owned by exactly one event player. It only grows: entries are
//! never removed, rewritten or reordered, and `sequence` is assigned at
//! append time (1-based, monotonically increasing).

use std::any::Any;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use mediator_core::{
    Message, MediatorError, MediatorResult, MessageId, MessageKind, MessageType, ReplayPolicy,
};

/// Object-safe view of a [`Message`] stored in the log.
pub trait LoggedPayload: Any + core::fmt::Debug + Send + Sync {
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

impl<M: Message> LoggedPayload for M {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

/// A single log entry.
///
/// Cloning an entry is cheap: the message itself is shared, not copied.
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    sequence: u64,
    message_id: MessageId,
    kind: MessageKind,
    message_type: MessageType,
    replay_policy: ReplayPolicy,
    emitted_at: DateTime<Utc>,
    payload: Arc<dyn LoggedPayload>,
}

impl LoggedMessage {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Policy declared by the message type at the time it was logged.
    pub fn replay_policy(&self) -> ReplayPolicy {
        self.replay_policy
    }

    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    pub fn is_command(&self) -> bool {
        self.kind == MessageKind::Command
    }

    pub fn is_query(&self) -> bool {
        self.kind == MessageKind::Query
    }

    /// The logged message, type-erased.
    pub fn payload(&self) -> &(dyn Any + Send + Sync) {
        self.payload.as_any()
    }

    /// True if the logged message is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.payload().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.payload().downcast_ref::<T>()
    }
}

/// Ordered, append-only sequence of [`LoggedMessage`]s.
///
/// The lock only exists so the owning player can be shared behind `Arc`;
/// concurrent writers are not a supported use.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: RwLock<Vec<LoggedMessage>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return the committed entry.
    pub fn append<M: Message>(
        &self,
        kind: MessageKind,
        message: Arc<M>,
    ) -> MediatorResult<LoggedMessage> {
        let mut entries = self.entries.write().map_err(|_| MediatorError::LogPoisoned)?;

        let sequence = entries.last().map(|e| e.sequence).unwrap_or(0) + 1;
        let entry = LoggedMessage {
            sequence,
            message_id: MessageId::new(),
            kind,
            message_type: MessageType::of::<M>(),
            replay_policy: M::REPLAY_POLICY,
            emitted_at: Utc::now(),
            payload: message,
        };
        entries.push(entry.clone());

        tracing::trace!(
            sequence,
            kind = %kind,
            message_type = entry.message_type.name(),
            "message appended to event log"
        );

        Ok(entry)
    }

    /// Stable copy of every entry, in emission order.
    pub fn snapshot(&self) -> MediatorResult<Vec<LoggedMessage>> {
        let entries = self.entries.read().map_err(|_| MediatorError::LogPoisoned)?;
        Ok(entries.clone())
    }

    pub fn len(&self) -> MediatorResult<usize> {
        let entries = self.entries.read().map_err(|_| MediatorError::LogPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> MediatorResult<bool> {
        self.len().map(|n| n == 0)
    }
}
