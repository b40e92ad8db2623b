use agora_store::{
    Ballot, Dao, DaoMembership, DelegationScope, ExecutionQueueEntry, GovernanceStore, Proposal,
    ProposalMetadata, QuorumHistoryRecord, ReadTxn, Sequence, StoreError, VoteChoice,
    VoteDelegation, WriteTxn,
};
use agora_store_lmdb::{LmdbStore, DEFAULT_MAP_SIZE};
use agora_types::{
    DaoId, DaoRole, DaoSettings, DelegationId, EntryId, ExecutionStatus, MembershipStatus,
    ProposalId, ProposalStatus, Timestamp, UserId,
};
use tempfile::TempDir;

fn open() -> (TempDir, LmdbStore) {
    let dir = TempDir::new().unwrap();
    let store = LmdbStore::open(dir.path(), DEFAULT_MAP_SIZE / 16).unwrap();
    (dir, store)
}

fn dao(id: u64) -> Dao {
    Dao {
        id: DaoId::new(id),
        name: format!("dao-{id}"),
        settings: DaoSettings {
            execution_delay_hours: Some(36),
            ..DaoSettings::default()
        },
        created_by: UserId::new(1),
        created_at: Timestamp::new(10),
    }
}

fn member(dao: u64, user: u64) -> DaoMembership {
    DaoMembership {
        dao_id: DaoId::new(dao),
        user_id: UserId::new(user),
        status: MembershipStatus::Approved,
        role: DaoRole::Member,
        joined_at: Timestamp::new(10),
        last_active: Timestamp::new(10),
    }
}

fn proposal(id: u64, dao: u64) -> Proposal {
    Proposal {
        id: ProposalId::new(id),
        dao_id: DaoId::new(dao),
        proposer_id: UserId::new(1),
        title: "Repave the square".into(),
        category: Some("infrastructure".into()),
        vote_start_time: Timestamp::new(100),
        vote_end_time: Timestamp::new(200),
        yes_votes: 0,
        no_votes: 0,
        abstain_votes: 0,
        status: ProposalStatus::Active,
        execution_type: "treasury_transfer".into(),
        execution_data: r#"{"amount":10}"#.into(),
        metadata: ProposalMetadata::default(),
        created_at: Timestamp::new(90),
        version: 0,
    }
}

#[test]
fn records_round_trip_through_lmdb() {
    let (_dir, store) = open();
    store
        .write(|txn| {
            txn.put_dao(&dao(1))?;
            txn.insert_proposal(&proposal(7, 1))?;
            txn.put_delegation(&VoteDelegation {
                id: DelegationId::new(3),
                dao_id: DaoId::new(1),
                delegator_id: UserId::new(2),
                delegate_id: UserId::new(4),
                scope: DelegationScope::Category,
                category: Some("infrastructure".into()),
                proposal_id: None,
                is_active: true,
                created_at: Timestamp::new(20),
                revoked_at: None,
            })?;
            txn.put_execution_entry(&ExecutionQueueEntry {
                id: EntryId::new(1),
                proposal_id: ProposalId::new(7),
                dao_id: DaoId::new(1),
                scheduled_for: Timestamp::new(5_000),
                execution_type: "treasury_transfer".into(),
                execution_data: "{}".into(),
                status: ExecutionStatus::InProgress {
                    worker: "w1".into(),
                    lease_expires_at: Timestamp::new(5_300),
                },
                attempts: 1,
                next_attempt_at: Timestamp::new(5_000),
                last_error: None,
                attempt_log: Vec::new(),
                created_at: Timestamp::new(300),
                completed_at: None,
            })?;
            Ok::<_, StoreError>(())
        })
        .unwrap();

    store
        .read(|txn| {
            assert_eq!(txn.get_dao(DaoId::new(1))?, Some(dao(1)));
            assert_eq!(txn.get_proposal(ProposalId::new(7))?, Some(proposal(7, 1)));
            let d = txn.get_delegation(DaoId::new(1), DelegationId::new(3))?.unwrap();
            assert_eq!(d.scope, DelegationScope::Category);
            let entry = txn.get_execution_entry(ProposalId::new(7))?.unwrap();
            assert!(entry.status.is_held_by("w1"));
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

#[test]
fn failed_write_is_rolled_back() {
    let (_dir, store) = open();
    let result: Result<(), StoreError> = store.write(|txn| {
        txn.put_dao(&dao(1))?;
        Err(StoreError::Backend("abort".into()))
    });
    assert!(result.is_err());
    let found = store.read(|txn| txn.get_dao(DaoId::new(1))).unwrap();
    assert!(found.is_none());
}

#[test]
fn prefix_scans_stay_within_parent() {
    let (_dir, store) = open();
    store
        .write(|txn| {
            for user in 1..=3 {
                txn.put_membership(&member(1, user))?;
            }
            txn.put_membership(&member(2, 1))?;
            for voter in [5u64, 2, 9] {
                txn.put_ballot(&Ballot {
                    proposal_id: ProposalId::new(1),
                    voter_id: UserId::new(voter),
                    choice: VoteChoice::Yes,
                    weight: 1,
                    represented: Vec::new(),
                    cast_at: Timestamp::new(150),
                })?;
            }
            for id in 1..=2 {
                txn.append_quorum_history(&QuorumHistoryRecord {
                    id,
                    dao_id: DaoId::new(1),
                    proposal_id: ProposalId::new(id),
                    active_member_count: 3,
                    required_quorum: 1,
                    achieved_quorum: 1,
                    quorum_met: true,
                    calculated_at: Timestamp::new(300 + id),
                })?;
            }
            Ok::<_, StoreError>(())
        })
        .unwrap();

    store
        .read(|txn| {
            assert_eq!(txn.list_memberships(DaoId::new(1))?.len(), 3);
            assert_eq!(txn.list_memberships(DaoId::new(2))?.len(), 1);
            let voters: Vec<u64> = txn
                .list_ballots(ProposalId::new(1))?
                .iter()
                .map(|b| b.voter_id.get())
                .collect();
            assert_eq!(voters, vec![2, 5, 9]);
            let history = txn.list_quorum_history(DaoId::new(1))?;
            assert_eq!(history.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
            assert!(txn.list_quorum_history(DaoId::new(2))?.is_empty());
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

#[test]
fn sequences_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = LmdbStore::open(dir.path(), DEFAULT_MAP_SIZE / 16).unwrap();
        let ids = store
            .write(|txn| Ok::<_, StoreError>((txn.next_id(Sequence::Dao)?, txn.next_id(Sequence::Dao)?)))
            .unwrap();
        assert_eq!(ids, (1, 2));
    }
    let store = LmdbStore::open(dir.path(), DEFAULT_MAP_SIZE / 16).unwrap();
    let next = store.write(|txn| txn.next_id(Sequence::Dao)).unwrap();
    assert_eq!(next, 3);
}

#[test]
fn stale_proposal_version_conflicts() {
    let (_dir, store) = open();
    store.write(|txn| txn.insert_proposal(&proposal(1, 1))).unwrap();

    let mut fresh = proposal(1, 1);
    fresh.yes_votes = 3;
    store.write(|txn| txn.update_proposal(&mut fresh)).unwrap();
    assert_eq!(fresh.version, 1);

    let mut stale = proposal(1, 1);
    let err = store
        .write(|txn| txn.update_proposal(&mut stale))
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let dup = store
        .write(|txn| txn.insert_proposal(&proposal(1, 1)))
        .unwrap_err();
    assert!(matches!(dup, StoreError::Duplicate(_)));
}
