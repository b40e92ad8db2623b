//! Governance core for Agora DAOs.
//!
//! Proposals are decided by one-member-one-vote with quorum and simple
//! majority, members may lend their vote to a delegate (capped per delegate),
//! and passed proposals wait out a timelock before an external executor
//! applies them.
//!
//! Every operation runs as a single store transaction; see
//! [`agora_store::GovernanceStore`].

pub mod controller;
pub mod delegation;
pub mod error;
pub mod executor;
pub mod membership;
pub mod quorum;
pub mod registry;
pub mod tally;
pub mod timelock;
pub mod voting;

pub use controller::GovernanceController;
pub use delegation::{DelegationManager, DelegationRequest};
pub use error::GovernanceError;
pub use executor::{EffectExecutor, ExecutionRequest, ExecutorError};
pub use membership::MembershipGate;
pub use quorum::{Evaluation, QuorumEvaluator, QuorumOverview};
pub use registry::{DaoRegistry, MemberUpdate, ModerationAction, NewDao, SettingsUpdate};
pub use tally::DelegationGraph;
pub use timelock::{DrainConfig, DrainReport, EnqueueOutcome, ExecutionScheduler, RetryPolicy};
pub use voting::{CastVote, NewProposal, VotingBooth};
