use async_trait::async_trait;

use mediator_core::{Command, HandlerResult, Query};

/// Executes one command type (command handler capability).
///
/// Exactly one handler type is bound per command type. The handler owns the
/// behavior; the mediator only routes to it and surfaces its result.
///
/// ## Construction
///
/// Handlers are built by the service container for every scope, so any state
/// they touch (repositories, counters, clocks) is resolved from the scope and
/// held behind `Arc`.
///
/// ## Error Handling
///
/// Failures are application-specific and travel as `anyhow::Error`. The
/// mediator does not catch, wrap or retry them.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    async fn handle(&self, command: &C) -> HandlerResult<()>;
}

/// Answers one query type (query handler capability).
///
/// The handler is keyed by the pair (query type, `Q::Output`), so the value it
/// returns is exactly the value the caller receives.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync + 'static {
    async fn handle(&self, query: &Q) -> HandlerResult<Q::Output>;
}
