use agora_store::StoreError;
use agora_types::{IllegalTransition, ProposalId, ProposalStatus, SettingsError, Timestamp, UserId};
use thiserror::Error;

/// Every way a governance operation can be refused.
///
/// Quorum and majority failures are business outcomes: evaluation records
/// them on the proposal, and they only surface as errors when someone tries
/// to execute a proposal that did not pass.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("voting is still open until {vote_end_time} (now {now}, {total_votes} votes so far)")]
    VotingInProgress {
        vote_end_time: Timestamp,
        now: Timestamp,
        total_votes: u64,
    },

    #[error("voting window for proposal {proposal_id} is closed")]
    VotingClosed {
        proposal_id: ProposalId,
        vote_start_time: Timestamp,
        vote_end_time: Timestamp,
    },

    #[error("Quorum not met: {total_votes}/{required_quorum} votes ({participation_rate:.2}% participation)")]
    QuorumNotMet {
        total_votes: u64,
        required_quorum: u64,
        active_member_count: u64,
        participation_rate: f64,
    },

    #[error("Majority not reached: {yes_votes} yes vs {no_votes} no")]
    MajorityNotReached { yes_votes: u64, no_votes: u64 },

    #[error("delegate already holds {current_delegations} of {max_allowed} allowed delegations ({cap_percentage}% cap)")]
    DelegationCapExceeded {
        current_delegations: u64,
        max_allowed: u64,
        cap_percentage: u32,
    },

    #[error("member {0} has already voted or is represented by a delegate's ballot")]
    AlreadyVoted(UserId),

    #[error("proposal {proposal_id} is {status}, which does not allow this action")]
    InvalidState {
        proposal_id: ProposalId,
        status: ProposalStatus,
    },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("effect executor failed: {0}")]
    ExecutorFailure(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GovernanceError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::VotingInProgress { .. } => "VOTING_IN_PROGRESS",
            Self::VotingClosed { .. } => "VOTING_CLOSED",
            Self::QuorumNotMet { .. } => "QUORUM_NOT_MET",
            Self::MajorityNotReached { .. } => "MAJORITY_NOT_REACHED",
            Self::DelegationCapExceeded { .. } => "DELEGATION_CAP_EXCEEDED",
            Self::AlreadyVoted(_) => "ALREADY_VOTED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            Self::ExecutorFailure(_) => "EXECUTOR_FAILURE",
            Self::Store(StoreError::Conflict { .. }) => "CONFLICT",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<SettingsError> for GovernanceError {
    fn from(e: SettingsError) -> Self {
        Self::Validation(e.to_string())
    }
}
