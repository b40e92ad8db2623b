//! Governance records and abstract storage traits for Agora.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`GovernanceStore`]. The rest of the codebase depends only on the traits
//! and on the record types defined here.
//!
//! All mutations happen inside [`GovernanceStore::write`]: the closure sees a
//! [`WriteTxn`], and its changes become visible atomically when it returns
//! `Ok`, or are discarded when it returns `Err`.

pub mod dao;
pub mod delegation;
pub mod error;
pub mod execution;
pub mod proposal;
pub mod transaction;

pub use dao::{Dao, DaoMembership};
pub use delegation::{DelegationScope, VoteDelegation};
pub use error::StoreError;
pub use execution::{AttemptOutcome, ExecutionAttempt, ExecutionQueueEntry};
pub use proposal::{Ballot, Proposal, ProposalMetadata, QuorumHistoryRecord, VoteChoice};
pub use transaction::{check_version, GovernanceStore, ReadTxn, Sequence, WriteTxn};
