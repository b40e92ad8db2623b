//! Execution queue entries.

use agora_types::{DaoId, EntryId, ExecutionStatus, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

/// Durable record of a passed proposal waiting out its timelock.
///
/// Exactly one entry exists per queued proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionQueueEntry {
    pub id: EntryId,
    pub proposal_id: ProposalId,
    pub dao_id: DaoId,
    /// The executor is never invoked before this instant.
    pub scheduled_for: Timestamp,
    pub execution_type: String,
    pub execution_data: String,
    pub status: ExecutionStatus,
    pub attempts: u32,
    /// Earliest time of the next attempt; moves forward on retry backoff.
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub attempt_log: Vec<ExecutionAttempt>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl ExecutionQueueEntry {
    /// Whether a drain at `now` may claim this entry.
    pub fn is_claimable(&self, now: Timestamp) -> bool {
        if now < self.scheduled_for {
            return false;
        }
        match &self.status {
            ExecutionStatus::Pending => now >= self.next_attempt_at,
            ExecutionStatus::InProgress {
                lease_expires_at, ..
            } => now >= *lease_expires_at,
            ExecutionStatus::Executed | ExecutionStatus::Failed => false,
        }
    }
}

/// One executor invocation, kept for operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAttempt {
    pub attempt: u32,
    pub worker: String,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub outcome: AttemptOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error: String },
    TimedOut,
}
