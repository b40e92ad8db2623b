//! Quorum & majority evaluation.
//!
//! `evaluate` resolves an `active` proposal whose voting window has closed into
//! `passed` or `failed`, and appends exactly one quorum history row. Calling it
//! again on a resolved proposal returns the recorded outcome and writes
//! nothing, so concurrent or repeated callers cannot duplicate history.

use crate::error::GovernanceError;
use crate::membership::{count_active_members, load_dao, require_execution_manager, require_member};
use agora_store::{Dao, GovernanceStore, Proposal, QuorumHistoryRecord, ReadTxn, Sequence};
use agora_types::params::{participation_rate, validate_quorum_percentage};
use agora_types::{Clock, DaoId, ProposalEvent, ProposalId, ProposalStatus, UserId};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Number of history rows included in an overview.
pub const RECENT_HISTORY_LEN: usize = 10;

/// Diagnostic outcome of an evaluation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub proposal_id: ProposalId,
    pub status: ProposalStatus,
    pub active_member_count: u64,
    pub required_quorum: u64,
    pub total_votes: u64,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub abstain_votes: u64,
    pub participation_rate: f64,
    pub quorum_met: bool,
    pub majority_reached: bool,
    pub failure_reason: Option<String>,
    /// False when the proposal had already been resolved before this call.
    pub newly_resolved: bool,
}

/// Current quorum picture of a DAO.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumOverview {
    pub dao_id: DaoId,
    pub active_member_count: u64,
    pub quorum_percentage: u32,
    pub required_quorum: u64,
    /// Newest first.
    pub recent_history: Vec<QuorumHistoryRecord>,
    /// Share of `recent_history` that met quorum, in percent.
    pub success_rate: f64,
    pub total_evaluations: u64,
}

/// Quorum and majority figures for a tally against a required quorum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuorumCheck {
    pub active_member_count: u64,
    pub required_quorum: u64,
    pub total_votes: u64,
    pub participation_rate: f64,
    pub quorum_met: bool,
    pub majority_reached: bool,
}

impl QuorumCheck {
    pub fn new(proposal: &Proposal, active_member_count: u64, required_quorum: u64) -> Self {
        let total_votes = proposal.total_votes();
        Self {
            active_member_count,
            required_quorum,
            total_votes,
            participation_rate: participation_rate(total_votes, active_member_count),
            quorum_met: total_votes >= required_quorum,
            majority_reached: proposal.majority_reached(),
        }
    }

    /// The failure this check represents, if any. Quorum is checked first.
    pub fn failure(&self, proposal: &Proposal) -> Option<GovernanceError> {
        if !self.quorum_met {
            Some(GovernanceError::QuorumNotMet {
                total_votes: self.total_votes,
                required_quorum: self.required_quorum,
                active_member_count: self.active_member_count,
                participation_rate: self.participation_rate,
            })
        } else if !self.majority_reached {
            Some(GovernanceError::MajorityNotReached {
                yes_votes: proposal.yes_votes,
                no_votes: proposal.no_votes,
            })
        } else {
            None
        }
    }
}

pub struct QuorumEvaluator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: GovernanceStore> QuorumEvaluator<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolve a proposal whose voting has ended.
    pub fn evaluate(&self, proposal_id: ProposalId) -> Result<Evaluation, GovernanceError> {
        let now = self.clock.now();
        self.store.write(|txn| {
            let mut proposal = load_proposal(&*txn, proposal_id)?;
            let dao = load_dao(&*txn, proposal.dao_id)?;

            if proposal.status.is_resolved() {
                return recorded_evaluation(&*txn, &dao, &proposal);
            }
            if now < proposal.vote_end_time {
                return Err(GovernanceError::VotingInProgress {
                    vote_end_time: proposal.vote_end_time,
                    now,
                    total_votes: proposal.total_votes(),
                });
            }

            let active = count_active_members(&*txn, dao.id)?;
            let check = QuorumCheck::new(&proposal, active, dao.settings.required_quorum(active));
            let failure = check.failure(&proposal);
            let event = if failure.is_some() {
                ProposalEvent::Fail
            } else {
                ProposalEvent::Pass
            };
            proposal.status = proposal.status.transition(event)?;
            proposal.metadata.failure_reason = failure.map(|e| e.to_string());
            txn.update_proposal(&mut proposal)?;

            let record = QuorumHistoryRecord {
                id: txn.next_id(Sequence::QuorumHistory)?,
                dao_id: dao.id,
                proposal_id,
                active_member_count: check.active_member_count,
                required_quorum: check.required_quorum,
                achieved_quorum: check.total_votes,
                quorum_met: check.quorum_met,
                calculated_at: now,
            };
            txn.append_quorum_history(&record)?;

            info!(
                dao = %dao.id,
                proposal = %proposal_id,
                status = %proposal.status,
                total_votes = check.total_votes,
                required_quorum = check.required_quorum,
                "proposal evaluated"
            );
            Ok(evaluation(&proposal, &check, true))
        })
    }

    /// Quorum settings, live requirement and recent history. Members only.
    pub fn quorum_overview(
        &self,
        dao_id: DaoId,
        caller_id: UserId,
    ) -> Result<QuorumOverview, GovernanceError> {
        self.store.read(|txn| {
            let dao = load_dao(txn, dao_id)?;
            require_member(txn, dao_id, caller_id)?;
            let active = count_active_members(txn, dao_id)?;
            let history = txn.list_quorum_history(dao_id)?;
            let total_evaluations = history.len() as u64;
            let recent: Vec<QuorumHistoryRecord> =
                history.into_iter().rev().take(RECENT_HISTORY_LEN).collect();
            let met = recent.iter().filter(|r| r.quorum_met).count();
            let success_rate = if recent.is_empty() {
                0.0
            } else {
                met as f64 / recent.len() as f64 * 100.0
            };
            Ok(QuorumOverview {
                dao_id,
                active_member_count: active,
                quorum_percentage: dao.settings.quorum_percentage,
                required_quorum: dao.settings.required_quorum(active),
                recent_history: recent,
                success_rate,
                total_evaluations,
            })
        })
    }

    /// Change a DAO's quorum percentage. Admins and elders only; 5..=75.
    pub fn set_quorum_percentage(
        &self,
        dao_id: DaoId,
        caller_id: UserId,
        quorum_percentage: u32,
    ) -> Result<Dao, GovernanceError> {
        self.store.write(|txn| {
            let mut dao = load_dao(&*txn, dao_id)?;
            require_execution_manager(&*txn, dao_id, caller_id)?;
            dao.settings.quorum_percentage = validate_quorum_percentage(quorum_percentage)?;
            txn.put_dao(&dao)?;
            info!(dao = %dao_id, quorum_percentage, by = %caller_id, "quorum percentage updated");
            Ok(dao)
        })
    }
}

pub(crate) fn load_proposal<T>(txn: &T, proposal_id: ProposalId) -> Result<Proposal, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    txn.get_proposal(proposal_id)?
        .ok_or_else(|| GovernanceError::NotFound(format!("proposal {proposal_id}")))
}

/// The quorum figures a resolved proposal was judged on: the latest history
/// row for it, or a fresh recount if none exists.
pub(crate) fn recorded_check<T>(
    txn: &T,
    dao: &Dao,
    proposal: &Proposal,
) -> Result<QuorumCheck, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    let last = txn
        .proposal_quorum_history(dao.id, proposal.id)?
        .into_iter()
        .last();
    Ok(match last {
        Some(record) => {
            QuorumCheck::new(proposal, record.active_member_count, record.required_quorum)
        }
        None => {
            let active = count_active_members(txn, dao.id)?;
            QuorumCheck::new(proposal, active, dao.settings.required_quorum(active))
        }
    })
}

fn recorded_evaluation<T>(
    txn: &T,
    dao: &Dao,
    proposal: &Proposal,
) -> Result<Evaluation, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    let check = recorded_check(txn, dao, proposal)?;
    Ok(evaluation(proposal, &check, false))
}

fn evaluation(proposal: &Proposal, check: &QuorumCheck, newly_resolved: bool) -> Evaluation {
    Evaluation {
        proposal_id: proposal.id,
        status: proposal.status,
        active_member_count: check.active_member_count,
        required_quorum: check.required_quorum,
        total_votes: check.total_votes,
        yes_votes: proposal.yes_votes,
        no_votes: proposal.no_votes,
        abstain_votes: proposal.abstain_votes,
        participation_rate: check.participation_rate,
        quorum_met: check.quorum_met,
        majority_reached: check.majority_reached,
        failure_reason: proposal.metadata.failure_reason.clone(),
        newly_resolved,
    }
}
