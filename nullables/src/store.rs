//! Nullable store: thread-safe in-memory storage for testing.

use agora_store::{
    check_version, Ballot, Dao, DaoMembership, ExecutionQueueEntry, GovernanceStore, Proposal,
    QuorumHistoryRecord, ReadTxn, Sequence, StoreError, VoteDelegation, WriteTxn,
};
use agora_types::{DaoId, DelegationId, ProposalId, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Default)]
struct MemoryState {
    daos: BTreeMap<DaoId, Dao>,
    memberships: BTreeMap<(DaoId, UserId), DaoMembership>,
    proposals: BTreeMap<ProposalId, Proposal>,
    ballots: BTreeMap<(ProposalId, UserId), Ballot>,
    quorum_history: BTreeMap<(DaoId, u64), QuorumHistoryRecord>,
    delegations: BTreeMap<(DaoId, DelegationId), VoteDelegation>,
    execution: BTreeMap<ProposalId, ExecutionQueueEntry>,
    sequences: HashMap<Sequence, u64>,
}

/// An in-memory governance store.
///
/// One mutex serialises every transaction. Writes run against a scratch copy
/// of the state that replaces the live state only when the closure returns
/// `Ok`, so a failed write leaves nothing behind.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<MemoryState>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of quorum history rows across all DAOs.
    pub fn quorum_history_len(&self) -> usize {
        self.lock().quorum_history.len()
    }

    /// Number of execution queue entries across all DAOs.
    pub fn execution_entry_count(&self) -> usize {
        self.lock().execution.len()
    }
}

impl GovernanceStore for NullStore {
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn ReadTxn) -> Result<R, E>,
    {
        let guard = self.lock();
        f(&*guard)
    }

    fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn WriteTxn) -> Result<R, E>,
    {
        let mut guard = self.lock();
        let mut scratch = guard.clone();
        let result = f(&mut scratch)?;
        *guard = scratch;
        Ok(result)
    }
}

impl ReadTxn for MemoryState {
    fn get_dao(&self, id: DaoId) -> Result<Option<Dao>, StoreError> {
        Ok(self.daos.get(&id).cloned())
    }

    fn get_membership(
        &self,
        dao_id: DaoId,
        user_id: UserId,
    ) -> Result<Option<DaoMembership>, StoreError> {
        Ok(self.memberships.get(&(dao_id, user_id)).cloned())
    }

    fn list_memberships(&self, dao_id: DaoId) -> Result<Vec<DaoMembership>, StoreError> {
        Ok(self
            .memberships
            .range((dao_id, UserId::new(0))..=(dao_id, UserId::new(u64::MAX)))
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        Ok(self.proposals.get(&id).cloned())
    }

    fn get_ballot(
        &self,
        proposal_id: ProposalId,
        voter_id: UserId,
    ) -> Result<Option<Ballot>, StoreError> {
        Ok(self.ballots.get(&(proposal_id, voter_id)).cloned())
    }

    fn list_ballots(&self, proposal_id: ProposalId) -> Result<Vec<Ballot>, StoreError> {
        Ok(self
            .ballots
            .range((proposal_id, UserId::new(0))..=(proposal_id, UserId::new(u64::MAX)))
            .map(|(_, b)| b.clone())
            .collect())
    }

    fn list_quorum_history(&self, dao_id: DaoId) -> Result<Vec<QuorumHistoryRecord>, StoreError> {
        Ok(self
            .quorum_history
            .range((dao_id, 0)..=(dao_id, u64::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn get_delegation(
        &self,
        dao_id: DaoId,
        id: DelegationId,
    ) -> Result<Option<VoteDelegation>, StoreError> {
        Ok(self.delegations.get(&(dao_id, id)).cloned())
    }

    fn list_delegations(&self, dao_id: DaoId) -> Result<Vec<VoteDelegation>, StoreError> {
        Ok(self
            .delegations
            .range((dao_id, DelegationId::new(0))..=(dao_id, DelegationId::new(u64::MAX)))
            .map(|(_, d)| d.clone())
            .collect())
    }

    fn get_execution_entry(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Option<ExecutionQueueEntry>, StoreError> {
        Ok(self.execution.get(&proposal_id).cloned())
    }

    fn list_execution_entries(&self) -> Result<Vec<ExecutionQueueEntry>, StoreError> {
        Ok(self.execution.values().cloned().collect())
    }
}

impl WriteTxn for MemoryState {
    fn next_id(&mut self, seq: Sequence) -> Result<u64, StoreError> {
        let counter = self.sequences.entry(seq).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn put_dao(&mut self, dao: &Dao) -> Result<(), StoreError> {
        self.daos.insert(dao.id, dao.clone());
        Ok(())
    }

    fn put_membership(&mut self, membership: &DaoMembership) -> Result<(), StoreError> {
        self.memberships
            .insert((membership.dao_id, membership.user_id), membership.clone());
        Ok(())
    }

    fn insert_proposal(&mut self, proposal: &Proposal) -> Result<(), StoreError> {
        if self.proposals.contains_key(&proposal.id) {
            return Err(StoreError::Duplicate(format!("proposal {}", proposal.id)));
        }
        self.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    fn update_proposal(&mut self, proposal: &mut Proposal) -> Result<(), StoreError> {
        let stored = self
            .proposals
            .get(&proposal.id)
            .ok_or_else(|| StoreError::NotFound(format!("proposal {}", proposal.id)))?;
        check_version(stored, proposal)?;
        proposal.version += 1;
        self.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    fn put_ballot(&mut self, ballot: &Ballot) -> Result<(), StoreError> {
        self.ballots
            .insert((ballot.proposal_id, ballot.voter_id), ballot.clone());
        Ok(())
    }

    fn append_quorum_history(&mut self, record: &QuorumHistoryRecord) -> Result<(), StoreError> {
        let key = (record.dao_id, record.id);
        if self.quorum_history.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("quorum history {}", record.id)));
        }
        self.quorum_history.insert(key, record.clone());
        Ok(())
    }

    fn put_delegation(&mut self, delegation: &VoteDelegation) -> Result<(), StoreError> {
        self.delegations
            .insert((delegation.dao_id, delegation.id), delegation.clone());
        Ok(())
    }

    fn put_execution_entry(&mut self, entry: &ExecutionQueueEntry) -> Result<(), StoreError> {
        self.execution.insert(entry.proposal_id, entry.clone());
        Ok(())
    }
}
