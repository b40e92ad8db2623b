//! Proposals, ballots and the quorum audit trail.

use agora_types::{DaoId, ProposalId, ProposalStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A governance proposal and its running tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: ProposalId,
    pub dao_id: DaoId,
    pub proposer_id: UserId,
    pub title: String,
    /// Used to match category-scoped delegations.
    pub category: Option<String>,
    pub vote_start_time: Timestamp,
    pub vote_end_time: Timestamp,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub abstain_votes: u64,
    pub status: ProposalStatus,
    /// Tells the executor what kind of effect `execution_data` describes.
    pub execution_type: String,
    /// Opaque JSON payload handed to the executor untouched.
    pub execution_data: String,
    pub metadata: ProposalMetadata,
    pub created_at: Timestamp,
    /// Bumped on every write; guards against lost updates.
    pub version: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalMetadata {
    pub failure_reason: Option<String>,
}

impl Proposal {
    pub fn total_votes(&self) -> u64 {
        self.yes_votes
            .saturating_add(self.no_votes)
            .saturating_add(self.abstain_votes)
    }

    /// Strict majority of yes over no. Ties fail.
    pub fn majority_reached(&self) -> bool {
        self.yes_votes > self.no_votes
    }

    pub fn voting_open(&self, now: Timestamp) -> bool {
        now >= self.vote_start_time && now < self.vote_end_time
    }
}

/// How a ballot was cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

/// One member's vote, carrying the weight of everyone it represents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub proposal_id: ProposalId,
    pub voter_id: UserId,
    pub choice: VoteChoice,
    pub weight: u64,
    /// Members whose vote was carried by this ballot through delegation.
    pub represented: Vec<UserId>,
    pub cast_at: Timestamp,
}

/// Append-only audit row written by every resolving quorum evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumHistoryRecord {
    pub id: u64,
    pub dao_id: DaoId,
    pub proposal_id: ProposalId,
    pub active_member_count: u64,
    pub required_quorum: u64,
    pub achieved_quorum: u64,
    pub quorum_met: bool,
    pub calculated_at: Timestamp,
}
