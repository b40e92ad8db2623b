//! Proposal lifecycle controller.
//!
//! Owns one instance of every governance component over a shared store and
//! clock, and is the single entry point used by the RPC layer and the drain
//! workers. Status changes all go through [`ProposalStatus::transition`], so
//! the lifecycle below is enforced in one place:
//!
//! ```text
//! active --evaluate: fail--> failed
//! active --evaluate: pass--> passed --enqueue--> queued --drain ok--> executed
//! ```
//!
//! [`ProposalStatus::transition`]: agora_types::ProposalStatus::transition

use crate::delegation::DelegationManager;
use crate::membership::MembershipGate;
use crate::quorum::QuorumEvaluator;
use crate::registry::DaoRegistry;
use crate::timelock::{DrainConfig, ExecutionScheduler};
use crate::voting::VotingBooth;
use agora_store::GovernanceStore;
use agora_types::Clock;
use std::sync::Arc;

pub struct GovernanceController<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    pub registry: DaoRegistry<S>,
    pub membership: MembershipGate<S>,
    pub voting: VotingBooth<S>,
    pub quorum: QuorumEvaluator<S>,
    pub delegation: DelegationManager<S>,
    pub scheduler: ExecutionScheduler<S>,
}

impl<S: GovernanceStore> GovernanceController<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, drain: DrainConfig) -> Self {
        Self {
            registry: DaoRegistry::new(store.clone(), clock.clone()),
            membership: MembershipGate::new(store.clone()),
            voting: VotingBooth::new(store.clone(), clock.clone()),
            quorum: QuorumEvaluator::new(store.clone(), clock.clone()),
            delegation: DelegationManager::new(store.clone(), clock.clone()),
            scheduler: ExecutionScheduler::new(store.clone(), clock.clone(), drain),
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
