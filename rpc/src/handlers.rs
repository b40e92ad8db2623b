//! RPC request handlers.
//!
//! Handlers are thin: they resolve the caller and path, call one governance
//! component, bump the matching counter and wrap the result in the envelope.
//! Authorization lives in the governance crate.

use crate::error::{RpcError, RpcResult};
use crate::extract::{ApiJson, ApiPath, ApiResponse, Caller};
use crate::server::RpcState;
use agora_governance::{
    CastVote, DelegationRequest, EnqueueOutcome, Evaluation, GovernanceError, MemberUpdate,
    NewDao, NewProposal, QuorumOverview, SettingsUpdate,
};
use agora_store::{
    Ballot, Dao, DaoMembership, ExecutionQueueEntry, GovernanceStore, Proposal, VoteChoice,
    VoteDelegation,
};
use agora_types::{DaoId, DelegationId, ProposalId, UserId};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info_span, Span};

/// Span covering a single RPC action.
pub fn rpc_span(action: &str) -> Span {
    info_span!("rpc", action = %action)
}

// ── Bodies ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumUpdate {
    pub quorum_percentage: u32,
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub choice: VoteChoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaoView {
    #[serde(flatten)]
    pub dao: Dao,
    pub active_member_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalView {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub ballots: Vec<Ballot>,
}

// ── Node ─────────────────────────────────────────────────────────────────

pub async fn health() -> ApiResponse<Value> {
    ApiResponse::ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn metrics<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
) -> RpcResult<Response> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    )
        .into_response())
}

// ── DAOs and membership ──────────────────────────────────────────────────

pub async fn create_dao<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiJson(body): ApiJson<NewDao>,
) -> RpcResult<ApiResponse<Dao>> {
    rpc_span("create_dao").in_scope(|| -> RpcResult<_> {
        let dao = state.gov.registry.create_dao(caller, body)?;
        Ok(ApiResponse::created(dao))
    })
}

pub async fn get_dao<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(_): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
) -> RpcResult<ApiResponse<DaoView>> {
    rpc_span("get_dao").in_scope(|| -> RpcResult<_> {
        let dao = state.gov.registry.get_dao(dao_id)?;
        let active_member_count = state.gov.membership.active_member_count(dao_id)?;
        Ok(ApiResponse::ok(DaoView {
            dao,
            active_member_count,
        }))
    })
}

pub async fn update_settings<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
    ApiJson(body): ApiJson<SettingsUpdate>,
) -> RpcResult<ApiResponse<Dao>> {
    rpc_span("update_settings").in_scope(|| -> RpcResult<_> {
        let dao = state.gov.registry.update_settings(dao_id, caller, body)?;
        Ok(ApiResponse::ok(dao))
    })
}

pub async fn join_dao<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
) -> RpcResult<ApiResponse<DaoMembership>> {
    rpc_span("join_dao").in_scope(|| -> RpcResult<_> {
        let membership = state.gov.registry.join(dao_id, caller)?;
        Ok(ApiResponse::ok(membership))
    })
}

pub async fn list_members<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
) -> RpcResult<ApiResponse<Vec<DaoMembership>>> {
    rpc_span("list_members").in_scope(|| -> RpcResult<_> {
        let members = state.gov.registry.list_members(dao_id, caller)?;
        Ok(ApiResponse::ok(members))
    })
}

/// Moderation and role change in one transaction.
pub async fn update_member<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath((dao_id, target)): ApiPath<(DaoId, UserId)>,
    ApiJson(body): ApiJson<MemberUpdate>,
) -> RpcResult<ApiResponse<DaoMembership>> {
    rpc_span("update_member").in_scope(|| -> RpcResult<_> {
        let member = state.gov.registry.update_member(dao_id, caller, target, body)?;
        Ok(ApiResponse::ok(member))
    })
}

// ── Quorum ───────────────────────────────────────────────────────────────

pub async fn quorum_overview<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
) -> RpcResult<ApiResponse<QuorumOverview>> {
    rpc_span("quorum_overview").in_scope(|| -> RpcResult<_> {
        let overview = state.gov.quorum.quorum_overview(dao_id, caller)?;
        Ok(ApiResponse::ok(overview))
    })
}

pub async fn set_quorum<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
    ApiJson(body): ApiJson<QuorumUpdate>,
) -> RpcResult<ApiResponse<Dao>> {
    rpc_span("set_quorum").in_scope(|| -> RpcResult<_> {
        let dao = state
            .gov
            .quorum
            .set_quorum_percentage(dao_id, caller, body.quorum_percentage)?;
        Ok(ApiResponse::ok(dao))
    })
}

pub async fn check_quorum<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(proposal_id): ApiPath<ProposalId>,
) -> RpcResult<ApiResponse<Evaluation>> {
    rpc_span("check_quorum").in_scope(|| -> RpcResult<_> {
        let proposal = state.gov.voting.get_proposal(proposal_id)?;
        state.gov.membership.check_member(proposal.dao_id, caller)?;
        let evaluation = state.gov.quorum.evaluate(proposal_id)?;
        if evaluation.newly_resolved {
            state
                .metrics
                .evaluations
                .with_label_values(&[evaluation.status.as_str()])
                .inc();
        }
        Ok(ApiResponse::ok(evaluation))
    })
}

// ── Proposals ────────────────────────────────────────────────────────────

pub async fn submit_proposal<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
    ApiJson(body): ApiJson<NewProposal>,
) -> RpcResult<ApiResponse<Proposal>> {
    rpc_span("submit_proposal").in_scope(|| -> RpcResult<_> {
        let proposal = state.gov.voting.submit_proposal(dao_id, caller, body)?;
        Ok(ApiResponse::created(proposal))
    })
}

pub async fn get_proposal<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(_): Caller,
    ApiPath(proposal_id): ApiPath<ProposalId>,
) -> RpcResult<ApiResponse<ProposalView>> {
    rpc_span("get_proposal").in_scope(|| -> RpcResult<_> {
        let proposal = state.gov.voting.get_proposal(proposal_id)?;
        let ballots = state.gov.voting.list_ballots(proposal_id)?;
        Ok(ApiResponse::ok(ProposalView { proposal, ballots }))
    })
}

pub async fn cast_vote<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(proposal_id): ApiPath<ProposalId>,
    ApiJson(body): ApiJson<VoteBody>,
) -> RpcResult<ApiResponse<CastVote>> {
    rpc_span("cast_vote").in_scope(|| -> RpcResult<_> {
        let vote = state.gov.voting.cast_vote(proposal_id, caller, body.choice)?;
        state.metrics.votes_cast.inc();
        Ok(ApiResponse::ok(vote))
    })
}

pub async fn execute_proposal<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(proposal_id): ApiPath<ProposalId>,
) -> RpcResult<ApiResponse<EnqueueOutcome>> {
    rpc_span("execute_proposal").in_scope(|| -> RpcResult<_> {
        let outcome = state.gov.scheduler.enqueue_execution(proposal_id, caller)?;
        if outcome.newly_queued {
            state.metrics.executions_queued.inc();
        }
        Ok(ApiResponse::ok(outcome))
    })
}

pub async fn execution_queue<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
) -> RpcResult<ApiResponse<Vec<ExecutionQueueEntry>>> {
    rpc_span("execution_queue").in_scope(|| -> RpcResult<_> {
        let entries = state.gov.scheduler.list_queue(dao_id, caller)?;
        Ok(ApiResponse::ok(entries))
    })
}

// ── Delegation ───────────────────────────────────────────────────────────

pub async fn create_delegation<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
    ApiJson(body): ApiJson<DelegationRequest>,
) -> RpcResult<ApiResponse<VoteDelegation>> {
    rpc_span("create_delegation").in_scope(|| -> RpcResult<_> {
        match state.gov.delegation.create_delegation(dao_id, caller, body) {
            Ok(delegation) => {
                state.metrics.delegations_created.inc();
                Ok(ApiResponse::created(delegation))
            }
            Err(e) => {
                if matches!(e, GovernanceError::DelegationCapExceeded { .. }) {
                    state.metrics.delegation_cap_rejections.inc();
                }
                Err(e.into())
            }
        }
    })
}

pub async fn list_delegations<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath(dao_id): ApiPath<DaoId>,
) -> RpcResult<ApiResponse<Vec<VoteDelegation>>> {
    rpc_span("list_delegations").in_scope(|| -> RpcResult<_> {
        let delegations = state.gov.delegation.list_active_delegations(dao_id, caller)?;
        Ok(ApiResponse::ok(delegations))
    })
}

pub async fn revoke_delegation<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    Caller(caller): Caller,
    ApiPath((dao_id, delegation_id)): ApiPath<(DaoId, DelegationId)>,
) -> RpcResult<ApiResponse<VoteDelegation>> {
    rpc_span("revoke_delegation").in_scope(|| -> RpcResult<_> {
        let delegation = state
            .gov
            .delegation
            .revoke_delegation(delegation_id, caller, dao_id)?;
        state.metrics.delegations_revoked.inc();
        Ok(ApiResponse::ok(delegation))
    })
}
