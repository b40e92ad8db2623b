//! Vote delegation records.

use crate::proposal::Proposal;
use agora_types::{DaoId, DelegationId, ProposalId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Which proposals a delegation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationScope {
    /// Every proposal in the DAO.
    All,
    /// Proposals tagged with `category`.
    Category,
    /// A single proposal.
    Proposal,
}

/// A delegator's assignment of their vote to a delegate.
///
/// Never deleted: revocation flips `is_active` and stamps `revoked_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDelegation {
    pub id: DelegationId,
    pub dao_id: DaoId,
    pub delegator_id: UserId,
    pub delegate_id: UserId,
    pub scope: DelegationScope,
    pub category: Option<String>,
    pub proposal_id: Option<ProposalId>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl VoteDelegation {
    /// Whether this delegation routes the delegator's vote on `proposal`.
    pub fn applies_to(&self, proposal: &Proposal) -> bool {
        if !self.is_active || self.dao_id != proposal.dao_id {
            return false;
        }
        match self.scope {
            DelegationScope::All => true,
            DelegationScope::Category => {
                self.category.is_some() && self.category == proposal.category
            }
            DelegationScope::Proposal => self.proposal_id == Some(proposal.id),
        }
    }
}
