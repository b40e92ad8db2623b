//! Axum-based RPC server.

use crate::error::RpcError;
use crate::handlers;
use agora_governance::GovernanceController;
use agora_store::GovernanceStore;
use agora_utils::GovernanceMetrics;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
pub struct RpcState<S> {
    pub gov: Arc<GovernanceController<S>>,
    pub metrics: Arc<GovernanceMetrics>,
}

impl<S> RpcState<S> {
    pub fn new(gov: Arc<GovernanceController<S>>, metrics: Arc<GovernanceMetrics>) -> Self {
        Self { gov, metrics }
    }
}

impl<S> Clone for RpcState<S> {
    fn clone(&self) -> Self {
        Self {
            gov: Arc::clone(&self.gov),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Build the full route table.
pub fn router<S: GovernanceStore + 'static>(state: RpcState<S>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics::<S>))
        // DAOs and membership
        .route("/daos", post(handlers::create_dao::<S>))
        .route("/daos/:dao_id", get(handlers::get_dao::<S>))
        .route("/daos/:dao_id/settings", put(handlers::update_settings::<S>))
        .route("/daos/:dao_id/join", post(handlers::join_dao::<S>))
        .route("/daos/:dao_id/members", get(handlers::list_members::<S>))
        .route(
            "/daos/:dao_id/members/:user_id",
            put(handlers::update_member::<S>),
        )
        // Quorum
        .route(
            "/daos/:dao_id/quorum",
            get(handlers::quorum_overview::<S>).put(handlers::set_quorum::<S>),
        )
        // Proposals
        .route(
            "/daos/:dao_id/proposals",
            post(handlers::submit_proposal::<S>),
        )
        .route("/proposals/:proposal_id", get(handlers::get_proposal::<S>))
        .route(
            "/proposals/:proposal_id/vote",
            post(handlers::cast_vote::<S>),
        )
        .route(
            "/proposals/:proposal_id/check-quorum",
            post(handlers::check_quorum::<S>),
        )
        .route(
            "/proposals/:proposal_id/execute",
            post(handlers::execute_proposal::<S>),
        )
        // Delegation
        .route(
            "/daos/:dao_id/delegate",
            post(handlers::create_delegation::<S>),
        )
        .route(
            "/daos/:dao_id/delegations",
            get(handlers::list_delegations::<S>),
        )
        .route(
            "/daos/:dao_id/delegate/:delegation_id",
            delete(handlers::revoke_delegation::<S>),
        )
        // Execution queue
        .route(
            "/daos/:dao_id/execution-queue",
            get(handlers::execution_queue::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            count_requests::<S>,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn count_requests<S: GovernanceStore + 'static>(
    State(state): State<RpcState<S>>,
    req: Request,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let response = next.run(req).await;
    state
        .metrics
        .http_requests
        .with_label_values(&[route.as_str(), response.status().as_str()])
        .inc();
    response
}

pub struct RpcServer<S> {
    pub addr: SocketAddr,
    state: RpcState<S>,
}

impl<S: GovernanceStore + 'static> RpcServer<S> {
    pub fn new(addr: SocketAddr, state: RpcState<S>) -> Self {
        Self { addr, state }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "RPC server listening");
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
