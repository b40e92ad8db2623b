//! Proposal submission and vote casting with delegated weight.

use crate::delegation::touch_member;
use crate::error::GovernanceError;
use crate::membership::{load_dao, require_member};
use crate::quorum::load_proposal;
use crate::tally::{represented_by, DelegationGraph};
use agora_store::{
    Ballot, GovernanceStore, Proposal, ProposalMetadata, ReadTxn, Sequence, VoteChoice,
};
use agora_types::{Clock, DaoId, ProposalId, ProposalStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::info;

/// A member's request to open a proposal for voting.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Defaults to the submission time.
    #[serde(default)]
    pub vote_start_time: Option<Timestamp>,
    pub vote_end_time: Timestamp,
    pub execution_type: String,
    /// Raw JSON handed to the executor once the proposal is executed.
    #[serde(default)]
    pub execution_data: String,
}

/// A recorded ballot and the tally it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub ballot: Ballot,
    pub proposal: Proposal,
}

pub struct VotingBooth<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: GovernanceStore> VotingBooth<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn submit_proposal(
        &self,
        dao_id: DaoId,
        proposer_id: UserId,
        request: NewProposal,
    ) -> Result<Proposal, GovernanceError> {
        let now = self.clock.now();
        let title = request.title.trim();
        if title.is_empty() {
            return Err(GovernanceError::Validation("title must not be empty".into()));
        }
        let execution_type = request.execution_type.trim();
        if execution_type.is_empty() {
            return Err(GovernanceError::Validation(
                "executionType must not be empty".into(),
            ));
        }
        let vote_start_time = request.vote_start_time.unwrap_or(now);
        if request.vote_end_time <= vote_start_time {
            return Err(GovernanceError::Validation(format!(
                "voteEndTime {} must be after voteStartTime {vote_start_time}",
                request.vote_end_time
            )));
        }
        let execution_data = if request.execution_data.trim().is_empty() {
            "{}".to_string()
        } else {
            request.execution_data
        };

        self.store.write(|txn| {
            load_dao(&*txn, dao_id)?;
            require_member(&*txn, dao_id, proposer_id)?;
            let proposal = Proposal {
                id: ProposalId::new(txn.next_id(Sequence::Proposal)?),
                dao_id,
                proposer_id,
                title: title.to_string(),
                category: request
                    .category
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
                vote_start_time,
                vote_end_time: request.vote_end_time,
                yes_votes: 0,
                no_votes: 0,
                abstain_votes: 0,
                status: ProposalStatus::Active,
                execution_type: execution_type.to_string(),
                execution_data,
                metadata: ProposalMetadata::default(),
                created_at: now,
                version: 0,
            };
            txn.insert_proposal(&proposal)?;
            touch_member(txn, dao_id, proposer_id, now)?;
            info!(dao = %dao_id, proposal = %proposal.id, by = %proposer_id, "proposal submitted");
            Ok(proposal)
        })
    }

    /// Record `voter_id`'s ballot, carrying every member whose delegation
    /// chain for this proposal reaches the voter.
    pub fn cast_vote(
        &self,
        proposal_id: ProposalId,
        voter_id: UserId,
        choice: VoteChoice,
    ) -> Result<CastVote, GovernanceError> {
        let now = self.clock.now();
        self.store.write(|txn| {
            let mut proposal = load_proposal(&*txn, proposal_id)?;
            let dao_id = proposal.dao_id;
            require_member(&*txn, dao_id, voter_id)?;
            if proposal.status != ProposalStatus::Active || !proposal.voting_open(now) {
                return Err(GovernanceError::VotingClosed {
                    proposal_id,
                    vote_start_time: proposal.vote_start_time,
                    vote_end_time: proposal.vote_end_time,
                });
            }

            let ballots = txn.list_ballots(proposal_id)?;
            let voted: HashSet<UserId> = ballots.iter().map(|b| b.voter_id).collect();
            let accounted: HashSet<UserId> = ballots
                .iter()
                .flat_map(|b| std::iter::once(b.voter_id).chain(b.represented.iter().copied()))
                .collect();
            if accounted.contains(&voter_id) {
                return Err(GovernanceError::AlreadyVoted(voter_id));
            }

            let eligible: BTreeSet<UserId> = txn
                .list_memberships(dao_id)?
                .into_iter()
                .filter(|m| m.status.is_eligible())
                .map(|m| m.user_id)
                .collect();
            let delegations = txn.list_active_delegations(dao_id)?;
            let graph = DelegationGraph::for_proposal(&delegations, &proposal);
            let represented = represented_by(&graph, voter_id, &eligible, &accounted, &voted);
            let weight = 1 + represented.len() as u64;

            match choice {
                VoteChoice::Yes => proposal.yes_votes += weight,
                VoteChoice::No => proposal.no_votes += weight,
                VoteChoice::Abstain => proposal.abstain_votes += weight,
            }
            txn.update_proposal(&mut proposal)?;

            let ballot = Ballot {
                proposal_id,
                voter_id,
                choice,
                weight,
                represented,
                cast_at: now,
            };
            txn.put_ballot(&ballot)?;
            touch_member(txn, dao_id, voter_id, now)?;

            info!(
                dao = %dao_id,
                proposal = %proposal_id,
                voter = %voter_id,
                choice = ?choice,
                weight,
                "vote cast"
            );
            Ok(CastVote { ballot, proposal })
        })
    }

    pub fn get_proposal(&self, proposal_id: ProposalId) -> Result<Proposal, GovernanceError> {
        self.store.read(|txn| load_proposal(txn, proposal_id))
    }

    /// Ballots cast on a proposal, in voter order.
    pub fn list_ballots(&self, proposal_id: ProposalId) -> Result<Vec<Ballot>, GovernanceError> {
        self.store.read(|txn| {
            load_proposal(txn, proposal_id)?;
            Ok(txn.list_ballots(proposal_id)?)
        })
    }
}
