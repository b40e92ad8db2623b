//! Delegation manager: members lend their vote to another member.
//!
//! Rules enforced on every new delegation, inside one write transaction:
//! - at most one active delegation per (delegator, DAO); a new one replaces the old
//! - a delegate holds at most `ceil(members × cap% / 100)` active delegations
//! - no self-delegation and no delegation loops
//!
//! Revocation only flips `is_active`; records are kept for audit.

use crate::error::GovernanceError;
use crate::membership::{count_active_members, load_dao, require_member};
use crate::tally::DelegationGraph;
use agora_store::{
    DelegationScope, GovernanceStore, ReadTxn, Sequence, VoteDelegation, WriteTxn,
};
use agora_types::{Clock, DaoId, DelegationId, ProposalId, UserId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What a member asks for when delegating.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    pub delegate_id: UserId,
    pub scope: DelegationScope,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub proposal_id: Option<ProposalId>,
}

pub struct DelegationManager<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: GovernanceStore> DelegationManager<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an active delegation from `delegator_id`, replacing any prior one.
    pub fn create_delegation(
        &self,
        dao_id: DaoId,
        delegator_id: UserId,
        request: DelegationRequest,
    ) -> Result<VoteDelegation, GovernanceError> {
        let now = self.clock.now();
        self.store.write(|txn| {
            let dao = load_dao(&*txn, dao_id)?;
            require_member(&*txn, dao_id, delegator_id)?;

            if request.delegate_id == delegator_id {
                return Err(GovernanceError::Validation(
                    "cannot delegate to self".to_string(),
                ));
            }
            match txn.get_membership(dao_id, request.delegate_id)? {
                Some(m) if m.status.is_eligible() => {}
                _ => {
                    return Err(GovernanceError::Validation(format!(
                        "delegate {} is not an approved member of dao {dao_id}",
                        request.delegate_id
                    )))
                }
            }
            let (category, proposal_id) = validate_scope(&*txn, dao_id, &request)?;

            let all = txn.list_delegations(dao_id)?;
            let prior: Vec<VoteDelegation> = all
                .iter()
                .filter(|d| d.is_active && d.delegator_id == delegator_id)
                .cloned()
                .collect();

            let mut graph = DelegationGraph::from_active(&all);
            graph.remove(&delegator_id);
            if graph.would_cycle(delegator_id, request.delegate_id) {
                return Err(GovernanceError::Validation(format!(
                    "delegating to {} would create a delegation loop",
                    request.delegate_id
                )));
            }

            let total_members = count_active_members(&*txn, dao_id)?;
            let max_allowed = dao.settings.max_delegations_per_delegate(total_members);
            let current = all
                .iter()
                .filter(|d| {
                    d.is_active
                        && d.delegate_id == request.delegate_id
                        && d.delegator_id != delegator_id
                })
                .count() as u64;
            if current >= max_allowed {
                debug!(
                    dao = %dao_id,
                    delegate = %request.delegate_id,
                    current,
                    max_allowed,
                    "delegation cap reached"
                );
                return Err(GovernanceError::DelegationCapExceeded {
                    current_delegations: current,
                    max_allowed,
                    cap_percentage: dao.settings.max_delegation_percentage,
                });
            }

            for mut old in prior {
                old.is_active = false;
                old.revoked_at = Some(now);
                txn.put_delegation(&old)?;
            }

            let delegation = VoteDelegation {
                id: DelegationId::new(txn.next_id(Sequence::Delegation)?),
                dao_id,
                delegator_id,
                delegate_id: request.delegate_id,
                scope: request.scope,
                category,
                proposal_id,
                is_active: true,
                created_at: now,
                revoked_at: None,
            };
            txn.put_delegation(&delegation)?;
            touch_member(txn, dao_id, delegator_id, now)?;

            info!(
                dao = %dao_id,
                delegator = %delegator_id,
                delegate = %delegation.delegate_id,
                scope = ?delegation.scope,
                "delegation created"
            );
            Ok(delegation)
        })
    }

    /// Deactivate a delegation. Only its delegator may do this.
    pub fn revoke_delegation(
        &self,
        delegation_id: DelegationId,
        caller_id: UserId,
        dao_id: DaoId,
    ) -> Result<VoteDelegation, GovernanceError> {
        let now = self.clock.now();
        self.store.write(|txn| {
            let mut delegation = txn.get_delegation(dao_id, delegation_id)?.ok_or_else(|| {
                GovernanceError::NotFound(format!("delegation {delegation_id} in dao {dao_id}"))
            })?;
            if delegation.delegator_id != caller_id {
                return Err(GovernanceError::Forbidden(format!(
                    "only the delegator may revoke delegation {delegation_id}"
                )));
            }
            if !delegation.is_active {
                return Ok(delegation);
            }
            delegation.is_active = false;
            delegation.revoked_at = Some(now);
            txn.put_delegation(&delegation)?;
            info!(dao = %dao_id, delegation = %delegation_id, "delegation revoked");
            Ok(delegation)
        })
    }

    /// The caller's active delegations in a DAO.
    pub fn list_active_delegations(
        &self,
        dao_id: DaoId,
        delegator_id: UserId,
    ) -> Result<Vec<VoteDelegation>, GovernanceError> {
        self.store.read(|txn| {
            load_dao(txn, dao_id)?;
            require_member(txn, dao_id, delegator_id)?;
            Ok(txn
                .list_active_delegations(dao_id)?
                .into_iter()
                .filter(|d| d.delegator_id == delegator_id)
                .collect())
        })
    }

    /// Number of active delegations currently held by `delegate_id`.
    pub fn delegations_held(
        &self,
        dao_id: DaoId,
        delegate_id: UserId,
    ) -> Result<u64, GovernanceError> {
        self.store.read(|txn| {
            Ok(txn
                .list_active_delegations(dao_id)?
                .iter()
                .filter(|d| d.delegate_id == delegate_id)
                .count() as u64)
        })
    }
}

fn validate_scope<T>(
    txn: &T,
    dao_id: DaoId,
    request: &DelegationRequest,
) -> Result<(Option<String>, Option<ProposalId>), GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    match request.scope {
        DelegationScope::All => Ok((None, None)),
        DelegationScope::Category => match request.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => Ok((Some(c.to_string()), None)),
            _ => Err(GovernanceError::Validation(
                "category scope requires a category".to_string(),
            )),
        },
        DelegationScope::Proposal => {
            let proposal_id = request.proposal_id.ok_or_else(|| {
                GovernanceError::Validation("proposal scope requires a proposalId".to_string())
            })?;
            match txn.get_proposal(proposal_id)? {
                Some(p) if p.dao_id == dao_id => Ok((None, Some(proposal_id))),
                _ => Err(GovernanceError::Validation(format!(
                    "proposal {proposal_id} does not belong to dao {dao_id}"
                ))),
            }
        }
    }
}

/// Stamp `last_active` on a member's record.
pub(crate) fn touch_member(
    txn: &mut dyn WriteTxn,
    dao_id: DaoId,
    user_id: UserId,
    now: agora_types::Timestamp,
) -> Result<(), GovernanceError> {
    if let Some(mut membership) = txn.get_membership(dao_id, user_id)? {
        membership.last_active = now;
        txn.put_membership(&membership)?;
    }
    Ok(())
}
