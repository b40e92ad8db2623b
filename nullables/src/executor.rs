//! Nullable effect executor with scripted outcomes and recorded calls.

use agora_governance::{EffectExecutor, ExecutionRequest, ExecutorError};
use agora_types::{EntryId, ProposalId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One call observed by a [`NullExecutor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub entry_id: EntryId,
    pub proposal_id: ProposalId,
    pub attempt: u32,
    pub execution_data: String,
}

#[derive(Default)]
struct Script {
    calls: Vec<RecordedCall>,
    scripted_failures: VecDeque<String>,
    always_fail: Option<String>,
    delay: Option<Duration>,
}

/// An executor that succeeds unless told otherwise.
#[derive(Default)]
pub struct NullExecutor {
    script: Mutex<Script>,
}

impl NullExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next call with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: impl Into<String>) {
        self.lock().scripted_failures.push_back(error.into());
    }

    /// Fail every call until [`NullExecutor::recover`] is called.
    pub fn always_fail(&self, error: impl Into<String>) {
        self.lock().always_fail = Some(error.into());
    }

    pub fn recover(&self) {
        let mut script = self.lock();
        script.always_fail = None;
        script.scripted_failures.clear();
    }

    /// Sleep this long inside every call.
    pub fn delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls made for one proposal.
    pub fn calls_for(&self, proposal_id: ProposalId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.proposal_id == proposal_id)
            .count()
    }
}

#[async_trait]
impl EffectExecutor for NullExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<(), ExecutorError> {
        let (delay, outcome) = {
            let mut script = self.lock();
            script.calls.push(RecordedCall {
                entry_id: request.entry_id,
                proposal_id: request.proposal_id,
                attempt: request.attempt,
                execution_data: request.execution_data.clone(),
            });
            let failure = script
                .scripted_failures
                .pop_front()
                .or_else(|| script.always_fail.clone());
            (script.delay, failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            Some(error) => Err(ExecutorError::Rejected(error)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "null"
    }
}
