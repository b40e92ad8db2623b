#![allow(dead_code)]

use agora_governance::{
    DelegationRequest, DrainConfig, GovernanceController, GovernanceError, NewDao, NewProposal,
};
use agora_nullables::{NullClock, NullStore};
use agora_store::{
    DaoMembership, DelegationScope, GovernanceStore, VoteChoice, VoteDelegation, WriteTxn,
};
use agora_types::{
    Clock, DaoId, DaoRole, DaoSettings, MembershipStatus, ProposalId, Timestamp, UserId,
};
use std::sync::Arc;

pub const START: u64 = 1_700_000_000;
pub const ADMIN: UserId = UserId::new(1);
pub const HOUR: u64 = 3_600;

pub fn user(n: u64) -> UserId {
    UserId::new(n)
}

pub struct Harness {
    pub store: Arc<NullStore>,
    pub clock: Arc<NullClock>,
    pub gov: Arc<GovernanceController<NullStore>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_drain(DrainConfig::default())
    }

    pub fn with_drain(config: DrainConfig) -> Self {
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::new(START));
        let gov = Arc::new(GovernanceController::new(
            store.clone(),
            clock.clone(),
            config,
        ));
        Self { store, clock, gov }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// A DAO whose admin is user 1 and whose approved members are users `1..=members`.
    pub fn dao(&self, members: u64, settings: DaoSettings) -> DaoId {
        let dao = self
            .gov
            .registry
            .create_dao(
                ADMIN,
                NewDao {
                    name: "commons".into(),
                    settings,
                },
            )
            .unwrap();
        let now = self.now();
        self.store
            .write(|txn| {
                for n in 2..=members {
                    txn.put_membership(&DaoMembership {
                        dao_id: dao.id,
                        user_id: user(n),
                        status: MembershipStatus::Approved,
                        role: DaoRole::Member,
                        joined_at: now,
                        last_active: now,
                    })?;
                }
                Ok::<_, GovernanceError>(())
            })
            .unwrap();
        dao.id
    }

    pub fn set_role(&self, dao_id: DaoId, target: UserId, role: DaoRole) {
        self.gov.registry.set_role(dao_id, ADMIN, target, role).unwrap();
    }

    /// A proposal open for 72 hours from now.
    pub fn proposal(&self, dao_id: DaoId, category: Option<&str>) -> ProposalId {
        self.gov
            .voting
            .submit_proposal(
                dao_id,
                ADMIN,
                NewProposal {
                    title: "Fund the community garden".into(),
                    category: category.map(str::to_string),
                    vote_start_time: None,
                    vote_end_time: self.now().plus_hours(72),
                    execution_type: "treasury_transfer".into(),
                    execution_data: r#"{"amount":500}"#.into(),
                },
            )
            .unwrap()
            .id
    }

    pub fn vote_range(&self, proposal_id: ProposalId, voters: std::ops::RangeInclusive<u64>, choice: VoteChoice) {
        for n in voters {
            self.gov.voting.cast_vote(proposal_id, user(n), choice).unwrap();
        }
    }

    pub fn close_voting(&self) {
        self.clock.advance_hours(73);
    }

    /// A proposal that has passed with `members` approved members all voting yes.
    pub fn passed_proposal(&self, dao_id: DaoId, members: u64) -> ProposalId {
        let pid = self.proposal(dao_id, None);
        self.vote_range(pid, 1..=members, VoteChoice::Yes);
        self.close_voting();
        self.gov.quorum.evaluate(pid).unwrap();
        pid
    }

    pub fn delegate(
        &self,
        dao_id: DaoId,
        from: u64,
        to: u64,
    ) -> Result<VoteDelegation, GovernanceError> {
        self.gov.delegation.create_delegation(
            dao_id,
            user(from),
            DelegationRequest {
                delegate_id: user(to),
                scope: DelegationScope::All,
                category: None,
                proposal_id: None,
            },
        )
    }
}
