//! RPC error types and their JSON envelope.

use agora_governance::GovernanceError;
use agora_store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("missing or malformed x-user-id header")]
    Unauthenticated,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error("server error: {0}")]
    Server(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Governance(e) => match e {
                GovernanceError::NotFound(_) => StatusCode::NOT_FOUND,
                GovernanceError::Forbidden(_) => StatusCode::FORBIDDEN,
                GovernanceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
                GovernanceError::Store(StoreError::Conflict { .. })
                | GovernanceError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
                GovernanceError::Store(_) | GovernanceError::ExecutorFailure(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Server(_) => "INTERNAL_ERROR",
            Self::Governance(GovernanceError::Store(StoreError::Duplicate(_))) => "CONFLICT",
            Self::Governance(e) => e.code(),
        }
    }

    /// Structured diagnostics for the variants that carry them.
    pub fn details(&self) -> Option<Value> {
        let Self::Governance(e) = self else {
            return None;
        };
        let details = match e {
            GovernanceError::DelegationCapExceeded {
                current_delegations,
                max_allowed,
                cap_percentage,
            } => json!({
                "currentDelegations": current_delegations,
                "maxAllowed": max_allowed,
                "capPercentage": cap_percentage,
            }),
            GovernanceError::QuorumNotMet {
                total_votes,
                required_quorum,
                active_member_count,
                participation_rate,
            } => json!({
                "totalVotes": total_votes,
                "requiredQuorum": required_quorum,
                "activeMemberCount": active_member_count,
                "participationRate": (participation_rate * 100.0).round() / 100.0,
            }),
            GovernanceError::MajorityNotReached {
                yes_votes,
                no_votes,
            } => json!({ "yesVotes": yes_votes, "noVotes": no_votes }),
            GovernanceError::VotingInProgress {
                vote_end_time,
                now,
                total_votes,
            } => json!({
                "voteEndTime": vote_end_time,
                "now": now,
                "totalVotes": total_votes,
            }),
            GovernanceError::VotingClosed {
                proposal_id,
                vote_start_time,
                vote_end_time,
            } => json!({
                "proposalId": proposal_id,
                "voteStartTime": vote_start_time,
                "voteEndTime": vote_end_time,
            }),
            GovernanceError::InvalidState {
                proposal_id,
                status,
            } => json!({ "proposalId": proposal_id, "status": status }),
            GovernanceError::AlreadyVoted(user_id) => json!({ "userId": user_id }),
            _ => return None,
        };
        Some(details)
    }

    /// Message shown to clients. Internal failures are logged, not exposed.
    fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            return "internal server error".to_string();
        }
        self.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                message: self.public_message(),
                code: self.code(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::{ProposalId, ProposalStatus, UserId};

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(RpcError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RpcError::from(GovernanceError::Forbidden("x".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RpcError::from(GovernanceError::NotFound("dao 1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RpcError::from(GovernanceError::AlreadyVoted(UserId::new(3))).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RpcError::from(GovernanceError::Store(StoreError::Conflict {
                entity: "proposal 1".into(),
                expected: 1,
                found: 2,
            }))
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RpcError::from(GovernanceError::Store(StoreError::Backend("disk".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn cap_details_use_camel_case() {
        let err = RpcError::from(GovernanceError::DelegationCapExceeded {
            current_delegations: 5,
            max_allowed: 5,
            cap_percentage: 10,
        });
        assert_eq!(err.code(), "DELEGATION_CAP_EXCEEDED");
        assert_eq!(
            err.details(),
            Some(json!({"currentDelegations": 5, "maxAllowed": 5, "capPercentage": 10}))
        );
    }

    #[test]
    fn quorum_details_round_participation() {
        let err = RpcError::from(GovernanceError::QuorumNotMet {
            total_votes: 1,
            required_quorum: 3,
            active_member_count: 3,
            participation_rate: 100.0 / 3.0,
        });
        let details = err.details().unwrap();
        assert_eq!(details["participationRate"], json!(33.33));
        assert!(err.public_message().contains("33.33%"));
    }

    #[test]
    fn invalid_state_details_name_the_status() {
        let err = RpcError::from(GovernanceError::InvalidState {
            proposal_id: ProposalId::new(9),
            status: ProposalStatus::Active,
        });
        assert_eq!(
            err.details(),
            Some(json!({"proposalId": 9, "status": "active"}))
        );
    }

    #[test]
    fn internal_message_is_hidden() {
        let err = RpcError::Server("pool exhausted".into());
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.details().is_none());
    }
}
