//! Boundary to the downstream effect executor.
//!
//! The executor is what actually moves funds or rewrites parameters once a
//! queued proposal's timelock has expired. Its internals are not part of this
//! crate; the drain only hands it the stored payload and records the outcome.

use agora_types::{DaoId, EntryId, ProposalId};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Payload passed to the executor for one attempt.
///
/// `(entry_id, attempt)` is unique per invocation; `entry_id` alone is stable
/// across retries and is what an executor should deduplicate on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub entry_id: EntryId,
    pub proposal_id: ProposalId,
    pub dao_id: DaoId,
    pub execution_type: String,
    pub execution_data: String,
    pub attempt: u32,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor refused the payload.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The executor could not be reached or failed internally.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EffectExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<(), ExecutorError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
