//! Execution timelock scheduler.
//!
//! Enqueueing is a pure scheduling decision: it writes one pending queue entry
//! `max(24h, dao delay or 48h)` in the future and never calls the executor.
//!
//! Draining is a lease-based work-queue consumer. A drain pass first claims
//! due entries in one transaction (pending → in-progress, leased to the
//! worker), then invokes the executor for each claim outside any transaction,
//! then settles each entry in its own transaction. Any number of workers may
//! drain the same store: a live lease makes an entry invisible to other
//! claimants, and a lease that lapses (crashed worker) makes it claimable again.

use crate::error::GovernanceError;
use crate::executor::{EffectExecutor, ExecutionRequest};
use crate::membership::{load_dao, require_execution_manager};
use crate::quorum::{load_proposal, recorded_check};
use agora_store::{
    AttemptOutcome, ExecutionAttempt, ExecutionQueueEntry, GovernanceStore, StoreError, WriteTxn,
};
use agora_types::time::SECS_PER_HOUR;
use agora_types::{
    Clock, DaoId, ExecutionEvent, ExecutionStatus, ProposalEvent, ProposalId, ProposalStatus,
    Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Exponential backoff between failed executor attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before an entry is marked failed for good. At least 1.
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_secs: 60,
            max_backoff_secs: SECS_PER_HOUR,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following attempt number `attempt` (1-based).
    pub fn backoff_secs(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(32);
        self.base_backoff_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_secs)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts.max(1)
    }
}

/// Tuning for drain passes.
#[derive(Clone, Debug)]
pub struct DrainConfig {
    /// Most entries one pass claims.
    pub batch_size: usize,
    /// How long a claim stays exclusive. Must exceed `executor_timeout`.
    pub lease: Duration,
    pub executor_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            lease: Duration::from_secs(300),
            executor_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of an enqueue call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueOutcome {
    pub entry: ExecutionQueueEntry,
    pub delay_hours: u32,
    /// False when the proposal was already queued and this call changed nothing.
    pub newly_queued: bool,
}

/// What one drain pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub claimed: usize,
    pub executed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Claims this worker lost to another worker before settling.
    pub lost: usize,
}

pub struct ExecutionScheduler<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: DrainConfig,
}

impl<S: GovernanceStore> ExecutionScheduler<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: DrainConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DrainConfig {
        &self.config
    }

    /// Queue a passed proposal behind its timelock. Admins and elders only.
    pub fn enqueue_execution(
        &self,
        proposal_id: ProposalId,
        caller_id: UserId,
    ) -> Result<EnqueueOutcome, GovernanceError> {
        let now = self.clock.now();
        self.store.write(|txn| {
            let mut proposal = load_proposal(&*txn, proposal_id)?;
            let dao = load_dao(&*txn, proposal.dao_id)?;
            require_execution_manager(&*txn, dao.id, caller_id)?;
            let delay_hours = dao.settings.effective_execution_delay_hours();

            match proposal.status {
                ProposalStatus::Queued | ProposalStatus::Executed => {
                    let entry = txn.get_execution_entry(proposal_id)?.ok_or_else(|| {
                        StoreError::Corruption(format!(
                            "proposal {proposal_id} is {} without a queue entry",
                            proposal.status
                        ))
                    })?;
                    return Ok(EnqueueOutcome {
                        entry,
                        delay_hours,
                        newly_queued: false,
                    });
                }
                ProposalStatus::Active => {
                    return Err(GovernanceError::InvalidState {
                        proposal_id,
                        status: proposal.status,
                    })
                }
                ProposalStatus::Passed | ProposalStatus::Failed => {}
            }

            let check = recorded_check(&*txn, &dao, &proposal)?;
            if let Some(failure) = check.failure(&proposal) {
                return Err(failure);
            }
            if proposal.status == ProposalStatus::Failed {
                return Err(GovernanceError::InvalidState {
                    proposal_id,
                    status: proposal.status,
                });
            }
            if txn.get_execution_entry(proposal_id)?.is_some() {
                return Err(StoreError::Duplicate(format!(
                    "execution entry for proposal {proposal_id}"
                ))
                .into());
            }

            let scheduled_for = now.plus_hours(u64::from(delay_hours));
            let entry = ExecutionQueueEntry {
                id: txn.next_entry_id()?,
                proposal_id,
                dao_id: dao.id,
                scheduled_for,
                execution_type: proposal.execution_type.clone(),
                execution_data: proposal.execution_data.clone(),
                status: ExecutionStatus::Pending,
                attempts: 0,
                next_attempt_at: scheduled_for,
                last_error: None,
                attempt_log: Vec::new(),
                created_at: now,
                completed_at: None,
            };
            proposal.status = proposal.status.transition(ProposalEvent::Queue)?;
            txn.update_proposal(&mut proposal)?;
            txn.put_execution_entry(&entry)?;

            info!(
                dao = %dao.id,
                proposal = %proposal_id,
                by = %caller_id,
                delay_hours,
                scheduled_for = %scheduled_for,
                "proposal queued for execution"
            );
            Ok(EnqueueOutcome {
                entry,
                delay_hours,
                newly_queued: true,
            })
        })
    }

    /// Queue entries of a DAO, soonest first. Admins and elders only.
    pub fn list_queue(
        &self,
        dao_id: DaoId,
        caller_id: UserId,
    ) -> Result<Vec<ExecutionQueueEntry>, GovernanceError> {
        self.store.read(|txn| {
            load_dao(txn, dao_id)?;
            require_execution_manager(txn, dao_id, caller_id)?;
            let mut entries: Vec<_> = txn
                .list_execution_entries()?
                .into_iter()
                .filter(|e| e.dao_id == dao_id)
                .collect();
            entries.sort_by_key(|e| (e.scheduled_for, e.id));
            Ok(entries)
        })
    }

    /// Run one drain pass as `worker` at time `now`.
    ///
    /// Executor failures are recorded per entry and never abort the pass; only
    /// a failure to claim (store error) is returned.
    pub async fn drain_due_entries(
        &self,
        now: Timestamp,
        worker: &str,
        executor: &dyn EffectExecutor,
    ) -> Result<DrainReport, GovernanceError> {
        let span = info_span!("drain", worker = %worker, now = %now);
        async move {
            let claimed = self.claim_due(now, worker)?;
            let mut report = DrainReport {
                claimed: claimed.len(),
                ..DrainReport::default()
            };
            if claimed.is_empty() {
                return Ok(report);
            }
            debug!(count = claimed.len(), executor = executor.name(), "claimed due entries");

            for entry in claimed {
                let request = ExecutionRequest {
                    entry_id: entry.id,
                    proposal_id: entry.proposal_id,
                    dao_id: entry.dao_id,
                    execution_type: entry.execution_type.clone(),
                    execution_data: entry.execution_data.clone(),
                    attempt: entry.attempts,
                };
                let started_at = now.max(self.clock.now());
                let outcome = match tokio::time::timeout(
                    self.config.executor_timeout,
                    executor.execute(&request),
                )
                .await
                {
                    Ok(Ok(())) => AttemptOutcome::Succeeded,
                    Ok(Err(e)) => AttemptOutcome::Failed {
                        error: e.to_string(),
                    },
                    Err(_) => AttemptOutcome::TimedOut,
                };
                let attempt = ExecutionAttempt {
                    attempt: entry.attempts,
                    worker: worker.to_string(),
                    started_at,
                    finished_at: started_at.max(self.clock.now()),
                    outcome,
                };

                match self.settle(entry.proposal_id, worker, attempt) {
                    Ok(Settled::Executed) => report.executed += 1,
                    Ok(Settled::Retrying) => report.retried += 1,
                    Ok(Settled::Failed) => report.failed += 1,
                    Ok(Settled::Lost) => report.lost += 1,
                    Err(e) => {
                        warn!(proposal = %entry.proposal_id, error = %e, "failed to settle queue entry");
                        report.lost += 1;
                    }
                }
            }
            info!(
                claimed = report.claimed,
                executed = report.executed,
                retried = report.retried,
                failed = report.failed,
                lost = report.lost,
                "drain pass finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Atomically lease every claimable entry (up to the batch size) to `worker`.
    fn claim_due(
        &self,
        now: Timestamp,
        worker: &str,
    ) -> Result<Vec<ExecutionQueueEntry>, GovernanceError> {
        let lease_expires_at = now.plus_secs(self.config.lease.as_secs().max(1));
        self.store.write(|txn| {
            let mut due: Vec<ExecutionQueueEntry> = txn
                .list_execution_entries()?
                .into_iter()
                .filter(|e| e.is_claimable(now))
                .collect();
            due.sort_by_key(|e| (e.scheduled_for, e.id));
            due.truncate(self.config.batch_size.max(1));

            for entry in due.iter_mut() {
                entry.status = entry.status.transition(ExecutionEvent::Claim {
                    worker: worker.to_string(),
                    now,
                    lease_expires_at,
                })?;
                entry.attempts += 1;
                txn.put_execution_entry(entry)?;
            }
            Ok(due)
        })
    }

    fn settle(
        &self,
        proposal_id: ProposalId,
        worker: &str,
        attempt: ExecutionAttempt,
    ) -> Result<Settled, GovernanceError> {
        let retry = &self.config.retry;
        self.store.write(|txn| {
            let Some(mut entry) = txn.get_execution_entry(proposal_id)? else {
                return Ok(Settled::Lost);
            };
            if !entry.status.is_held_by(worker) {
                warn!(proposal = %proposal_id, worker, "lease lost before settling; outcome discarded");
                return Ok(Settled::Lost);
            }

            let finished_at = attempt.finished_at;
            let settled = match &attempt.outcome {
                AttemptOutcome::Succeeded => {
                    entry.status = entry.status.transition(ExecutionEvent::Complete)?;
                    entry.completed_at = Some(finished_at);
                    entry.last_error = None;
                    mark_proposal_executed(txn, proposal_id)?;
                    info!(proposal = %proposal_id, attempt = attempt.attempt, "proposal executed");
                    Settled::Executed
                }
                failed => {
                    let error = match failed {
                        AttemptOutcome::Failed { error } => error.clone(),
                        _ => "executor call timed out".to_string(),
                    };
                    entry.last_error = Some(error.clone());
                    if retry.exhausted(entry.attempts) {
                        entry.status = entry.status.transition(ExecutionEvent::Abandon)?;
                        entry.completed_at = Some(finished_at);
                        warn!(
                            proposal = %proposal_id,
                            attempts = entry.attempts,
                            error = %error,
                            "execution failed permanently; proposal stays queued"
                        );
                        Settled::Failed
                    } else {
                        let backoff = retry.backoff_secs(entry.attempts);
                        entry.status = entry.status.transition(ExecutionEvent::Release)?;
                        entry.next_attempt_at = finished_at.plus_secs(backoff);
                        warn!(
                            proposal = %proposal_id,
                            attempts = entry.attempts,
                            backoff_secs = backoff,
                            error = %error,
                            "execution attempt failed; will retry"
                        );
                        Settled::Retrying
                    }
                }
            };
            entry.attempt_log.push(attempt);
            txn.put_execution_entry(&entry)?;
            Ok(settled)
        })
    }
}

enum Settled {
    Executed,
    Retrying,
    Failed,
    Lost,
}

fn mark_proposal_executed(
    txn: &mut dyn WriteTxn,
    proposal_id: ProposalId,
) -> Result<(), GovernanceError> {
    let mut proposal = load_proposal(&*txn, proposal_id)?;
    proposal.status = proposal.status.transition(ProposalEvent::Execute)?;
    txn.update_proposal(&mut proposal)?;
    Ok(())
}
