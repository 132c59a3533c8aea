//! Message contracts: the commands and queries routed by the mediator.

use core::any::TypeId;

use serde::{Deserialize, Serialize};

use crate::replay_policy::ReplayPolicy;

/// Root contract for anything that flows through the mediator.
///
/// The concrete type is the dispatch key: the mediator never looks at message
/// contents to decide where a message goes, only at `TypeId::of::<Self>()`.
///
/// ## Replay metadata
///
/// `REPLAY_POLICY` is declared once per type, next to the type itself. The
/// default is [`ReplayPolicy::NONE`], which means "never replay".
///
/// ```ignore
/// #[derive(Debug)]
/// struct ReserveStock { sku: String, qty: u32 }
///
/// impl Message for ReserveStock {
///     const REPLAY_POLICY: ReplayPolicy = ReplayPolicy::REPLAYABLE.union(ReplayPolicy::MUTATES_DATA);
/// }
/// impl Command for ReserveStock {}
/// ```
///
/// ## Design Constraints
///
/// Messages must be:
/// - **Debug**: log entries and tracing output print them
/// - **Send + Sync**: the event log shares them behind `Arc`
/// - **'static**: they are stored type-erased in the log
pub trait Message: core::fmt::Debug + Send + Sync + 'static {
    /// Replay metadata for this message type.
    const REPLAY_POLICY: ReplayPolicy = ReplayPolicy::NONE;

    /// Human-readable type name used in errors and logs.
    fn message_type() -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// A message with no return value; represents intent to change state.
pub trait Command: Message {}

/// A message that produces a value; a read with no side effects by convention.
pub trait Query: Message {
    /// The value produced by this query's handler.
    type Output: Send + 'static;
}

/// Whether a logged message was emitted as a command or a query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    Query,
}

impl core::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MessageKind::Command => f.write_str("command"),
            MessageKind::Query => f.write_str("query"),
        }
    }
}

/// Identity of a concrete message type: its `TypeId` plus a printable name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    pub fn of<M: Message>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: M::message_type(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl core::fmt::Display for MessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}
