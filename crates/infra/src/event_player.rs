//! Event Player: records every message it emits, then dispatches it.
//!
//! ```text
//! emit_command(C) ──append──► EventLog
//!        └──────────dispatch──► CommandDispatcher
//!
//! replay() ──snapshot──► policy check ──► CommandDispatcher::dispatch_dyn
//! ```
//!
//! The append happens when `emit_*` is called, not when the returned future is
//! first polled, so the log order is the call order even if several emissions
//! are created before any of them is awaited. A failed dispatch leaves its
//! entry in the log.

use std::future::Future;
use std::sync::Arc;

use mediator_core::{Command, MediatorResult, MessageKind, Query};
use mediator_events::{EventLog, LoggedMessage};

use crate::command_dispatcher::CommandDispatcher;
use crate::config::ReplayFailureMode;
use crate::query_dispatcher::QueryDispatcher;
use crate::registry::HandlerRegistry;
use crate::replay::{replay_entries, ReplayReport};

#[derive(Debug)]
pub struct EventPlayer {
    commands: Arc<CommandDispatcher>,
    queries: Arc<QueryDispatcher>,
    log: EventLog,
    replay_failure_mode: ReplayFailureMode,
}

impl EventPlayer {
    pub fn new(commands: Arc<CommandDispatcher>, queries: Arc<QueryDispatcher>) -> Self {
        Self {
            commands,
            queries,
            log: EventLog::new(),
            replay_failure_mode: ReplayFailureMode::default(),
        }
    }

    pub fn with_replay_failure_mode(mut self, mode: ReplayFailureMode) -> Self {
        self.replay_failure_mode = mode;
        self
    }

    pub fn replay_failure_mode(&self) -> ReplayFailureMode {
        self.replay_failure_mode
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.commands.registry()
    }

    /// Record `command`, then dispatch it.
    pub fn emit_command<C: Command>(
        &self,
        command: C,
    ) -> impl Future<Output = MediatorResult<()>> + Send + '_ {
        let command = Arc::new(command);
        let appended = self
            .log
            .append(MessageKind::Command, command.clone())
            .map(|_| ());

        async move {
            appended?;
            self.commands.dispatch(command.as_ref()).await
        }
    }

    /// Record `query`, then dispatch it and return the handler's value.
    pub fn emit_query<Q: Query>(
        &self,
        query: Q,
    ) -> impl Future<Output = MediatorResult<Q::Output>> + Send + '_ {
        let query = Arc::new(query);
        let appended = self
            .log
            .append(MessageKind::Query, query.clone())
            .map(|_| ());

        async move {
            appended?;
            self.queries.dispatch(query.as_ref()).await
        }
    }

    /// Snapshot of the log in emission order.
    pub fn log(&self) -> MediatorResult<Vec<LoggedMessage>> {
        self.log.snapshot()
    }

    pub fn log_len(&self) -> MediatorResult<usize> {
        self.log.len()
    }

    /// Re-execute every logged command whose type is replayable.
    ///
    /// Works on a snapshot taken at entry: messages emitted by handlers during
    /// replay are logged but not replayed in this pass.
    pub async fn replay(&self) -> MediatorResult<ReplayReport> {
        let entries = self.log.snapshot()?;
        tracing::info!(entries = entries.len(), "replaying event log");
        replay_entries(&entries, &self.commands, self.replay_failure_mode).await
    }
}
