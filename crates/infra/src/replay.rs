//! Selective re-execution of logged messages.
//!
//! Replay walks a snapshot of the log in emission order and re-dispatches each
//! command whose type is declared `REPLAYABLE`, passing the same logged
//! instance back to its handler. Queries are never re-executed. Replayed
//! commands are not appended to the log again.

use serde::Serialize;

use mediator_core::MediatorResult;
use mediator_events::LoggedMessage;

use crate::command_dispatcher::CommandDispatcher;
use crate::config::ReplayFailureMode;

/// One replayed command whose handler failed (only recorded under `Continue`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayFailure {
    pub sequence: u64,
    pub message_type: String,
    pub error: String,
}

/// Outcome of a replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Commands successfully re-executed.
    pub replayed: u64,
    pub skipped_queries: u64,
    /// Commands skipped because their type is not `REPLAYABLE`.
    pub skipped_not_replayable: u64,
    pub failures: Vec<ReplayFailure>,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of log entries the pass looked at.
    pub fn visited(&self) -> u64 {
        self.replayed
            + self.skipped_queries
            + self.skipped_not_replayable
            + self.failures.len() as u64
    }
}

/// Replay `entries` through `commands`.
///
/// Replayability is read from the policy recorded on each entry, so a
/// replayable command without a handler fails like any other dispatch.
///
/// Under [`ReplayFailureMode::Abort`] the first failure is returned
/// unchanged; commands already replayed stay applied.
pub async fn replay_entries(
    entries: &[LoggedMessage],
    commands: &CommandDispatcher,
    on_failure: ReplayFailureMode,
) -> MediatorResult<ReplayReport> {
    let mut report = ReplayReport::default();

    for entry in entries {
        if entry.is_query() {
            report.skipped_queries += 1;
            continue;
        }

        let message_type = entry.message_type();
        if !entry.replay_policy().is_replayable() {
            tracing::debug!(
                sequence = entry.sequence(),
                message_type = message_type.name(),
                "command not replayable; skipped"
            );
            report.skipped_not_replayable += 1;
            continue;
        }

        match commands.dispatch_dyn(message_type, entry.payload()).await {
            Ok(()) => report.replayed += 1,
            Err(err) => match on_failure {
                ReplayFailureMode::Abort => {
                    tracing::error!(
                        sequence = entry.sequence(),
                        message_type = message_type.name(),
                        error = %err,
                        "replay aborted"
                    );
                    return Err(err);
                }
                ReplayFailureMode::Continue => {
                    tracing::warn!(
                        sequence = entry.sequence(),
                        message_type = message_type.name(),
                        error = %err,
                        "replayed command failed; continuing"
                    );
                    report.failures.push(ReplayFailure {
                        sequence: entry.sequence(),
                        message_type: message_type.name().to_string(),
                        error: err.to_string(),
                    });
                }
            },
        }
    }

    tracing::info!(
        replayed = report.replayed,
        skipped_queries = report.skipped_queries,
        skipped_not_replayable = report.skipped_not_replayable,
        failures = report.failures.len(),
        "replay complete"
    );

    Ok(report)
}
