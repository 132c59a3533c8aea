//! Mediator configuration.
//!
//! Values come from code (`MediatorConfig::default()` plus setters) or from the
//! process environment:
//!
//! | variable | values | default |
//! |---|---|---|
//! | `MEDIATOR_HANDLER_CONFLICT` | `fail_fast`, `last_wins` | `fail_fast` |
//! | `MEDIATOR_REPLAY_ON_FAILURE` | `abort`, `continue` | `abort` |

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use mediator_core::MediatorError;

pub const HANDLER_CONFLICT_ENV: &str = "MEDIATOR_HANDLER_CONFLICT";
pub const REPLAY_ON_FAILURE_ENV: &str = "MEDIATOR_REPLAY_ON_FAILURE";

/// What registration does when two handlers claim the same message type.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Reject the second handler with `DuplicateHandler`.
    #[default]
    FailFast,
    /// The later registration replaces the earlier one.
    LastWins,
}

impl FromStr for ConflictPolicy {
    type Err = MediatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_fast" => Ok(Self::FailFast),
            "last_wins" => Ok(Self::LastWins),
            other => Err(MediatorError::invalid_config(format!(
                "{HANDLER_CONFLICT_ENV}: unknown conflict policy '{other}'"
            ))),
        }
    }
}

/// What replay does when a re-executed command fails.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFailureMode {
    /// Stop at the first failure and return it unchanged.
    #[default]
    Abort,
    /// Record the failure in the report and keep going.
    Continue,
}

impl FromStr for ReplayFailureMode {
    type Err = MediatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(MediatorError::invalid_config(format!(
                "{REPLAY_ON_FAILURE_ENV}: unknown replay failure mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatorConfig {
    pub conflict_policy: ConflictPolicy,
    pub replay_failure_mode: ReplayFailureMode,
}

impl MediatorConfig {
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_replay_failure_mode(mut self, mode: ReplayFailureMode) -> Self {
        self.replay_failure_mode = mode;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, MediatorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup (unset keys keep defaults).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MediatorError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(HANDLER_CONFLICT_ENV) {
            config.conflict_policy = raw.parse()?;
        }
        if let Some(raw) = lookup(REPLAY_ON_FAILURE_ENV) {
            config.replay_failure_mode = raw.parse()?;
        }

        tracing::debug!(
            conflict_policy = ?config.conflict_policy,
            replay_failure_mode = ?config.replay_failure_mode,
            "mediator configuration loaded"
        );

        Ok(config)
    }
}
