//! Fundamental types for Agora governance.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, timestamps and clocks, membership roles, the proposal and execution
//! status machines, and the DAO-level settings with their quorum arithmetic.

pub mod ids;
pub mod params;
pub mod role;
pub mod state;
pub mod time;

pub use ids::{DaoId, DelegationId, EntryId, ProposalId, UserId};
pub use params::{DaoSettings, SettingsError};
pub use role::{DaoRole, MembershipStatus};
pub use state::{
    ExecutionEvent, ExecutionStatus, IllegalTransition, ProposalEvent, ProposalStatus,
};
pub use time::{Clock, SystemClock, Timestamp};
