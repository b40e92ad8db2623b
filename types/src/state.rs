//! Status enums for proposals and execution queue entries.
//!
//! Each status type has exactly one transition function. Handlers never assign a
//! status directly; they apply an event and store whatever the transition yields.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An event was applied to a status that does not accept it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("illegal transition: {event} from {from}")]
pub struct IllegalTransition {
    pub from: String,
    pub event: String,
}

/// Lifecycle of a governance proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Accepting ballots until `vote_end_time`.
    Active,
    /// Quorum and majority reached; awaiting an authorized enqueue.
    Passed,
    /// Quorum or majority missed.
    Failed,
    /// Sitting in the execution queue behind its timelock.
    Queued,
    /// Effects applied by the executor.
    Executed,
}

/// Events that move a proposal through its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalEvent {
    Pass,
    Fail,
    Queue,
    Execute,
}

impl ProposalStatus {
    pub fn transition(self, event: ProposalEvent) -> Result<Self, IllegalTransition> {
        use ProposalEvent as E;
        match (self, event) {
            (Self::Active, E::Pass) => Ok(Self::Passed),
            (Self::Active, E::Fail) => Ok(Self::Failed),
            (Self::Passed, E::Queue) => Ok(Self::Queued),
            (Self::Queued, E::Execute) => Ok(Self::Executed),
            (from, event) => Err(IllegalTransition {
                from: from.as_str().to_string(),
                event: format!("{event:?}"),
            }),
        }
    }

    /// Whether evaluation has already resolved this proposal.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Queued => "queued",
            Self::Executed => "executed",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of an execution queue entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Waiting for `scheduled_for` (and any retry backoff) to pass.
    Pending,
    /// Claimed by a drain worker until the lease expires.
    InProgress {
        worker: String,
        lease_expires_at: Timestamp,
    },
    /// The executor applied the effects.
    Executed,
    /// Retries exhausted. Terminal.
    Failed,
}

/// Events applied to an execution entry by the drain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// Take the lease. Valid from `Pending`, or from `InProgress` once the lease lapsed.
    Claim {
        worker: String,
        now: Timestamp,
        lease_expires_at: Timestamp,
    },
    /// The executor succeeded.
    Complete,
    /// The attempt failed but may be retried.
    Release,
    /// The attempt failed and no retries remain.
    Abandon,
}

impl ExecutionStatus {
    pub fn transition(&self, event: ExecutionEvent) -> Result<Self, IllegalTransition> {
        use ExecutionEvent as E;
        match (self, event) {
            (
                Self::Pending,
                E::Claim {
                    worker,
                    lease_expires_at,
                    ..
                },
            ) => Ok(Self::InProgress {
                worker,
                lease_expires_at,
            }),
            (
                Self::InProgress {
                    lease_expires_at: held_until,
                    ..
                },
                E::Claim {
                    worker,
                    now,
                    lease_expires_at,
                },
            ) if *held_until <= now => Ok(Self::InProgress {
                worker,
                lease_expires_at,
            }),
            (Self::InProgress { .. }, E::Complete) => Ok(Self::Executed),
            (Self::InProgress { .. }, E::Release) => Ok(Self::Pending),
            (Self::InProgress { .. }, E::Abandon) => Ok(Self::Failed),
            (from, event) => Err(IllegalTransition {
                from: from.as_str().to_string(),
                event: format!("{event:?}"),
            }),
        }
    }

    /// Whether `worker` currently holds the lease on this entry.
    pub fn is_held_by(&self, worker: &str) -> bool {
        matches!(self, Self::InProgress { worker: w, .. } if w == worker)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress { .. } => "in_progress",
            Self::Executed => "executed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
