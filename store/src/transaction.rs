//! Transactional access to governance state.

use crate::dao::{Dao, DaoMembership};
use crate::delegation::VoteDelegation;
use crate::error::StoreError;
use crate::execution::ExecutionQueueEntry;
use crate::proposal::{Ballot, Proposal, QuorumHistoryRecord};
use agora_types::{DaoId, DelegationId, EntryId, ProposalId, UserId};

/// Monotonic id sequences allocated by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sequence {
    Dao,
    Proposal,
    Delegation,
    QuorumHistory,
    ExecutionEntry,
}

impl Sequence {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dao => "dao",
            Self::Proposal => "proposal",
            Self::Delegation => "delegation",
            Self::QuorumHistory => "quorum_history",
            Self::ExecutionEntry => "execution_entry",
        }
    }
}

/// Read access within a transaction. Every read sees one consistent snapshot.
pub trait ReadTxn {
    fn get_dao(&self, id: DaoId) -> Result<Option<Dao>, StoreError>;

    fn get_membership(
        &self,
        dao_id: DaoId,
        user_id: UserId,
    ) -> Result<Option<DaoMembership>, StoreError>;

    /// All memberships of a DAO regardless of status.
    fn list_memberships(&self, dao_id: DaoId) -> Result<Vec<DaoMembership>, StoreError>;

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError>;

    fn get_ballot(
        &self,
        proposal_id: ProposalId,
        voter_id: UserId,
    ) -> Result<Option<Ballot>, StoreError>;

    fn list_ballots(&self, proposal_id: ProposalId) -> Result<Vec<Ballot>, StoreError>;

    /// Quorum history of a DAO, oldest first.
    fn list_quorum_history(&self, dao_id: DaoId) -> Result<Vec<QuorumHistoryRecord>, StoreError>;

    fn get_delegation(
        &self,
        dao_id: DaoId,
        id: DelegationId,
    ) -> Result<Option<VoteDelegation>, StoreError>;

    /// Every delegation ever created in a DAO, including revoked ones.
    fn list_delegations(&self, dao_id: DaoId) -> Result<Vec<VoteDelegation>, StoreError>;

    fn get_execution_entry(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Option<ExecutionQueueEntry>, StoreError>;

    fn list_execution_entries(&self) -> Result<Vec<ExecutionQueueEntry>, StoreError>;

    /// Active delegations in a DAO.
    fn list_active_delegations(&self, dao_id: DaoId) -> Result<Vec<VoteDelegation>, StoreError> {
        Ok(self
            .list_delegations(dao_id)?
            .into_iter()
            .filter(|d| d.is_active)
            .collect())
    }

    /// Quorum history rows for a single proposal, oldest first.
    fn proposal_quorum_history(
        &self,
        dao_id: DaoId,
        proposal_id: ProposalId,
    ) -> Result<Vec<QuorumHistoryRecord>, StoreError> {
        Ok(self
            .list_quorum_history(dao_id)?
            .into_iter()
            .filter(|r| r.proposal_id == proposal_id)
            .collect())
    }
}

/// Write access within a transaction.
pub trait WriteTxn: ReadTxn {
    /// Allocate the next id from `seq`. Ids start at 1.
    fn next_id(&mut self, seq: Sequence) -> Result<u64, StoreError>;

    fn put_dao(&mut self, dao: &Dao) -> Result<(), StoreError>;

    fn put_membership(&mut self, membership: &DaoMembership) -> Result<(), StoreError>;

    /// Insert a new proposal. Fails with `Duplicate` if the id exists.
    fn insert_proposal(&mut self, proposal: &Proposal) -> Result<(), StoreError>;

    /// Overwrite a proposal if its stored version equals `proposal.version`,
    /// then bump `proposal.version`.
    fn update_proposal(&mut self, proposal: &mut Proposal) -> Result<(), StoreError>;

    fn put_ballot(&mut self, ballot: &Ballot) -> Result<(), StoreError>;

    fn append_quorum_history(&mut self, record: &QuorumHistoryRecord) -> Result<(), StoreError>;

    fn put_delegation(&mut self, delegation: &VoteDelegation) -> Result<(), StoreError>;

    /// Insert or replace the entry for `entry.proposal_id`.
    fn put_execution_entry(&mut self, entry: &ExecutionQueueEntry) -> Result<(), StoreError>;

    /// Allocate a typed id for an execution entry.
    fn next_entry_id(&mut self) -> Result<EntryId, StoreError> {
        self.next_id(Sequence::ExecutionEntry).map(EntryId::new)
    }
}

/// A store that runs closures as atomic transactions.
///
/// Writers are serialised: at most one `write` closure runs at a time per
/// store, so read-check-write sequences inside a closure cannot race.
pub trait GovernanceStore: Send + Sync {
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn ReadTxn) -> Result<R, E>;

    fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn WriteTxn) -> Result<R, E>;
}

/// Shared version check for `update_proposal` implementations.
pub fn check_version(stored: &Proposal, incoming: &Proposal) -> Result<(), StoreError> {
    if stored.version != incoming.version {
        return Err(StoreError::Conflict {
            entity: format!("proposal {}", incoming.id),
            expected: incoming.version,
            found: stored.version,
        });
    }
    Ok(())
}
