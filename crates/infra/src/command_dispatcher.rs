//! Command dispatch (no result).
//!
//! ```text
//! Command
//!   ↓
//! 1. Look up the binding by TypeId (HandlerNotFound on miss)
//!   ↓
//! 2. Resolve the handler from the dispatcher's scope
//!   ↓
//! 3. Invoke it and surface its outcome unchanged
//! ```
//!
//! The dispatcher does not log, retry or transform anything. Recording messages
//! is the event player's job.

use std::any::Any;
use std::sync::Arc;

use mediator_core::{Command, MediatorResult, MessageType};

use crate::container::ScopedProvider;
use crate::registry::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    registry: Arc<HandlerRegistry>,
    scope: ScopedProvider,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, scope: ScopedProvider) -> Self {
        Self { registry, scope }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Route `command` to its bound handler.
    pub async fn dispatch<C: Command>(&self, command: &C) -> MediatorResult<()> {
        self.dispatch_dyn(MessageType::of::<C>(), command).await
    }

    /// Route a type-erased command. `message_type` must describe `command`.
    ///
    /// Used by replay, where only the logged runtime type is known.
    pub async fn dispatch_dyn(
        &self,
        message_type: MessageType,
        command: &(dyn Any + Send + Sync),
    ) -> MediatorResult<()> {
        let binding = self.registry.resolve_command(message_type)?;

        tracing::debug!(
            message_type = message_type.name(),
            handler = binding.handler_type(),
            "dispatching command"
        );

        binding.invoke(&self.scope, command).await
    }
}
