//! LMDB implementation of `GovernanceStore`.
//!
//! `read` runs its closure inside one LMDB read transaction (a consistent
//! snapshot). `write` runs inside one LMDB write transaction, committed only
//! when the closure returns `Ok`; LMDB allows a single writer per
//! environment, so concurrent `write` calls queue up behind each other.

use crate::environment::{LmdbEnvironment, RawDb, Tables};
use crate::LmdbError;
use agora_store::{
    check_version, Ballot, Dao, DaoMembership, ExecutionQueueEntry, GovernanceStore, Proposal,
    QuorumHistoryRecord, ReadTxn, Sequence, StoreError, VoteDelegation, WriteTxn,
};
use agora_types::{DaoId, DelegationId, ProposalId, UserId};
use heed::{RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub struct LmdbStore {
    env: LmdbEnvironment,
}

impl LmdbStore {
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        Ok(Self {
            env: LmdbEnvironment::open(path, map_size)?,
        })
    }

    pub fn environment(&self) -> &LmdbEnvironment {
        &self.env
    }
}

impl GovernanceStore for LmdbStore {
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn ReadTxn) -> Result<R, E>,
    {
        let rtxn = self
            .env
            .env
            .read_txn()
            .map_err(|e| StoreError::from(LmdbError::from(e)))?;
        let view = Reader {
            txn: &rtxn,
            tables: &self.env.tables,
        };
        f(&view)
    }

    fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn WriteTxn) -> Result<R, E>,
    {
        let wtxn = self
            .env
            .env
            .write_txn()
            .map_err(|e| StoreError::from(LmdbError::from(e)))?;
        let mut view = Writer {
            txn: wtxn,
            tables: &self.env.tables,
        };
        let result = f(&mut view)?;
        view.txn
            .commit()
            .map_err(|e| StoreError::from(LmdbError::from(e)))?;
        Ok(result)
    }
}

fn key2(a: [u8; 8], b: [u8; 8]) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a);
    key[8..].copy_from_slice(&b);
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value).map_err(LmdbError::from)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes).map_err(LmdbError::from)?)
}

/// Read helpers shared by read and write transactions.
struct Reader<'t, 'e> {
    txn: &'t RoTxn<'e>,
    tables: &'t Tables,
}

impl Reader<'_, '_> {
    fn get<T: DeserializeOwned>(&self, db: RawDb, key: &[u8]) -> Result<Option<T>, StoreError> {
        match db.get(self.txn, key).map_err(LmdbError::from)? {
            Some(bytes) => decode(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, db: RawDb, prefix: &[u8]) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::new();
        for item in db.prefix_iter(self.txn, prefix).map_err(LmdbError::from)? {
            let (_, bytes) = item.map_err(LmdbError::from)?;
            out.push(decode(bytes)?);
        }
        Ok(out)
    }

    fn all<T: DeserializeOwned>(&self, db: RawDb) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::new();
        for item in db.iter(self.txn).map_err(LmdbError::from)? {
            let (_, bytes) = item.map_err(LmdbError::from)?;
            out.push(decode(bytes)?);
        }
        Ok(out)
    }
}

impl ReadTxn for Reader<'_, '_> {
    fn get_dao(&self, id: DaoId) -> Result<Option<Dao>, StoreError> {
        self.get(self.tables.daos, &id.to_key())
    }

    fn get_membership(
        &self,
        dao_id: DaoId,
        user_id: UserId,
    ) -> Result<Option<DaoMembership>, StoreError> {
        self.get(
            self.tables.memberships,
            &key2(dao_id.to_key(), user_id.to_key()),
        )
    }

    fn list_memberships(&self, dao_id: DaoId) -> Result<Vec<DaoMembership>, StoreError> {
        self.scan(self.tables.memberships, &dao_id.to_key())
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        self.get(self.tables.proposals, &id.to_key())
    }

    fn get_ballot(
        &self,
        proposal_id: ProposalId,
        voter_id: UserId,
    ) -> Result<Option<Ballot>, StoreError> {
        self.get(
            self.tables.ballots,
            &key2(proposal_id.to_key(), voter_id.to_key()),
        )
    }

    fn list_ballots(&self, proposal_id: ProposalId) -> Result<Vec<Ballot>, StoreError> {
        self.scan(self.tables.ballots, &proposal_id.to_key())
    }

    fn list_quorum_history(&self, dao_id: DaoId) -> Result<Vec<QuorumHistoryRecord>, StoreError> {
        self.scan(self.tables.quorum_history, &dao_id.to_key())
    }

    fn get_delegation(
        &self,
        dao_id: DaoId,
        id: DelegationId,
    ) -> Result<Option<VoteDelegation>, StoreError> {
        self.get(
            self.tables.delegations,
            &key2(dao_id.to_key(), id.to_key()),
        )
    }

    fn list_delegations(&self, dao_id: DaoId) -> Result<Vec<VoteDelegation>, StoreError> {
        self.scan(self.tables.delegations, &dao_id.to_key())
    }

    fn get_execution_entry(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Option<ExecutionQueueEntry>, StoreError> {
        self.get(self.tables.execution_queue, &proposal_id.to_key())
    }

    fn list_execution_entries(&self) -> Result<Vec<ExecutionQueueEntry>, StoreError> {
        self.all(self.tables.execution_queue)
    }
}

struct Writer<'e> {
    txn: RwTxn<'e>,
    tables: &'e Tables,
}

impl<'e> Writer<'e> {
    fn reader(&self) -> Reader<'_, 'e> {
        Reader {
            txn: &self.txn,
            tables: self.tables,
        }
    }

    fn put<T: Serialize>(&mut self, db: RawDb, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = encode(value)?;
        db.put(&mut self.txn, key, &bytes).map_err(LmdbError::from)?;
        Ok(())
    }
}

impl ReadTxn for Writer<'_> {
    fn get_dao(&self, id: DaoId) -> Result<Option<Dao>, StoreError> {
        self.reader().get_dao(id)
    }

    fn get_membership(
        &self,
        dao_id: DaoId,
        user_id: UserId,
    ) -> Result<Option<DaoMembership>, StoreError> {
        self.reader().get_membership(dao_id, user_id)
    }

    fn list_memberships(&self, dao_id: DaoId) -> Result<Vec<DaoMembership>, StoreError> {
        self.reader().list_memberships(dao_id)
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        self.reader().get_proposal(id)
    }

    fn get_ballot(
        &self,
        proposal_id: ProposalId,
        voter_id: UserId,
    ) -> Result<Option<Ballot>, StoreError> {
        self.reader().get_ballot(proposal_id, voter_id)
    }

    fn list_ballots(&self, proposal_id: ProposalId) -> Result<Vec<Ballot>, StoreError> {
        self.reader().list_ballots(proposal_id)
    }

    fn list_quorum_history(&self, dao_id: DaoId) -> Result<Vec<QuorumHistoryRecord>, StoreError> {
        self.reader().list_quorum_history(dao_id)
    }

    fn get_delegation(
        &self,
        dao_id: DaoId,
        id: DelegationId,
    ) -> Result<Option<VoteDelegation>, StoreError> {
        self.reader().get_delegation(dao_id, id)
    }

    fn list_delegations(&self, dao_id: DaoId) -> Result<Vec<VoteDelegation>, StoreError> {
        self.reader().list_delegations(dao_id)
    }

    fn get_execution_entry(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Option<ExecutionQueueEntry>, StoreError> {
        self.reader().get_execution_entry(proposal_id)
    }

    fn list_execution_entries(&self) -> Result<Vec<ExecutionQueueEntry>, StoreError> {
        self.reader().list_execution_entries()
    }
}

impl WriteTxn for Writer<'_> {
    fn next_id(&mut self, seq: Sequence) -> Result<u64, StoreError> {
        let key = seq.name().as_bytes();
        let last = match self
            .tables
            .sequences
            .get(&self.txn, key)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption(format!("sequence {} has bad length", seq.name()))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = last + 1;
        self.tables
            .sequences
            .put(&mut self.txn, key, &next.to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(next)
    }

    fn put_dao(&mut self, dao: &Dao) -> Result<(), StoreError> {
        self.put(self.tables.daos, &dao.id.to_key(), dao)
    }

    fn put_membership(&mut self, membership: &DaoMembership) -> Result<(), StoreError> {
        let key = key2(membership.dao_id.to_key(), membership.user_id.to_key());
        self.put(self.tables.memberships, &key, membership)
    }

    fn insert_proposal(&mut self, proposal: &Proposal) -> Result<(), StoreError> {
        if self.get_proposal(proposal.id)?.is_some() {
            return Err(StoreError::Duplicate(format!("proposal {}", proposal.id)));
        }
        self.put(self.tables.proposals, &proposal.id.to_key(), proposal)
    }

    fn update_proposal(&mut self, proposal: &mut Proposal) -> Result<(), StoreError> {
        let stored = self
            .get_proposal(proposal.id)?
            .ok_or_else(|| StoreError::NotFound(format!("proposal {}", proposal.id)))?;
        check_version(&stored, proposal)?;
        proposal.version += 1;
        self.put(self.tables.proposals, &proposal.id.to_key(), &*proposal)
    }

    fn put_ballot(&mut self, ballot: &Ballot) -> Result<(), StoreError> {
        let key = key2(ballot.proposal_id.to_key(), ballot.voter_id.to_key());
        self.put(self.tables.ballots, &key, ballot)
    }

    fn append_quorum_history(&mut self, record: &QuorumHistoryRecord) -> Result<(), StoreError> {
        let key = key2(record.dao_id.to_key(), record.id.to_be_bytes());
        let exists = self
            .tables
            .quorum_history
            .get(&self.txn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        if exists {
            return Err(StoreError::Duplicate(format!("quorum history {}", record.id)));
        }
        self.put(self.tables.quorum_history, &key, record)
    }

    fn put_delegation(&mut self, delegation: &VoteDelegation) -> Result<(), StoreError> {
        let key = key2(delegation.dao_id.to_key(), delegation.id.to_key());
        self.put(self.tables.delegations, &key, delegation)
    }

    fn put_execution_entry(&mut self, entry: &ExecutionQueueEntry) -> Result<(), StoreError> {
        self.put(
            self.tables.execution_queue,
            &entry.proposal_id.to_key(),
            entry,
        )
    }
}
