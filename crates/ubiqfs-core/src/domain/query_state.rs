//! Lifecycle of an index query
//!
//! ## State Machine
//!
//! ```text
//! ┌───────────────┐  construct  ┌─────────────────┐  account  ┌─────────────────────────────┐
//! │ Uninitialized │ ──────────► │ AwaitingAccount │ ────────► │ AwaitingContainerResolution │
//! └───────────────┘             └─────────────────┘           └─────────────────────────────┘
//!                                        │                          │                │
//!                                        │ no account  failed or    │                │ resolved
//!                                        │             rejected     │                │
//!                                        ▼                          ▼                ▼
//!                                 ┌────────────────────────────────────┐      ┌─────────┐  stop  ┌─────────┐
//!                                 │        Failed(SetupFailure)        │      │ Running │ ─────► │ Stopped │
//!                                 └────────────────────────────────────┘      └─────────┘        └─────────┘
//! ```
//!
//! `Failed` and `Stopped` are terminal. Setup failures are never retried.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Why an observer never reached `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupFailure {
    /// No cloud account is signed in on this device
    NoAccount,
    /// The container location could not be resolved
    ContainerUnavailable,
    /// The container resolved but the platform refused to start the query
    QueryRejected,
}

impl fmt::Display for SetupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupFailure::NoAccount => write!(f, "no signed-in account"),
            SetupFailure::ContainerUnavailable => write!(f, "container unavailable"),
            SetupFailure::QueryRejected => write!(f, "query rejected"),
        }
    }
}

/// State of an index query owned by an observer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    #[default]
    Uninitialized,
    AwaitingAccount,
    AwaitingContainerResolution,
    Running,
    Stopped,
    Failed(SetupFailure),
}

impl QueryState {
    /// Returns the state name for error messages and logs
    pub fn name(&self) -> &'static str {
        match self {
            QueryState::Uninitialized => "Uninitialized",
            QueryState::AwaitingAccount => "AwaitingAccount",
            QueryState::AwaitingContainerResolution => "AwaitingContainerResolution",
            QueryState::Running => "Running",
            QueryState::Stopped => "Stopped",
            QueryState::Failed(_) => "Failed",
        }
    }

    /// Returns true once no further transition will happen on its own
    ///
    /// `Running` counts as settled: it only leaves on explicit teardown.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            QueryState::Running | QueryState::Stopped | QueryState::Failed(_)
        )
    }

    /// Returns true for states with no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Stopped | QueryState::Failed(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, QueryState::Running)
    }

    /// Checks whether `target` is a legal next state
    pub fn can_transition_to(&self, target: &QueryState) -> bool {
        matches!(
            (self, target),
            (QueryState::Uninitialized, QueryState::AwaitingAccount)
                | (
                    QueryState::AwaitingAccount,
                    QueryState::Failed(SetupFailure::NoAccount)
                )
                | (
                    QueryState::AwaitingAccount,
                    QueryState::AwaitingContainerResolution
                )
                | (
                    QueryState::AwaitingContainerResolution,
                    QueryState::Failed(SetupFailure::ContainerUnavailable)
                )
                | (
                    QueryState::AwaitingContainerResolution,
                    QueryState::Failed(SetupFailure::QueryRejected)
                )
                | (QueryState::AwaitingContainerResolution, QueryState::Running)
                | (QueryState::Running, QueryState::Stopped)
        )
    }

    /// Moves to `target` if the transition is legal
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` for any transition not in the
    /// state machine
    pub fn transition_to(&mut self, target: QueryState) -> Result<(), DomainError> {
        if !self.can_transition_to(&target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Uninitialized => write!(f, "uninitialized"),
            QueryState::AwaitingAccount => write!(f, "awaiting account"),
            QueryState::AwaitingContainerResolution => write!(f, "awaiting container"),
            QueryState::Running => write!(f, "running"),
            QueryState::Stopped => write!(f, "stopped"),
            QueryState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
