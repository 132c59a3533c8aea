//! Query dispatch (typed result).
//!
//! Bindings are keyed by (query type, `Q::Output`), so the boxed value an
//! invoker returns is always a `Q::Output`. A failed downcast would mean a
//! corrupt registry and is reported as `MessageTypeMismatch`.

use std::sync::Arc;

use mediator_core::{MediatorError, MediatorResult, Query};

use crate::container::ScopedProvider;
use crate::registry::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    registry: Arc<HandlerRegistry>,
    scope: ScopedProvider,
}

impl QueryDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, scope: ScopedProvider) -> Self {
        Self { registry, scope }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Route `query` to its bound handler and return the handler's value.
    pub async fn dispatch<Q: Query>(&self, query: &Q) -> MediatorResult<Q::Output> {
        let binding = self.registry.resolve_query::<Q>()?;

        tracing::debug!(
            message_type = Q::message_type(),
            output = binding.output_type(),
            handler = binding.handler_type(),
            "dispatching query"
        );

        let output = binding.invoke(&self.scope, query).await?;
        output
            .downcast::<Q::Output>()
            .map(|boxed| *boxed)
            .map_err(|_| MediatorError::MessageTypeMismatch {
                expected: core::any::type_name::<Q::Output>(),
                found: binding.output_type().to_string(),
            })
    }
}
