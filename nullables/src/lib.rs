//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the governance core (clock, storage, effect
//! executor) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! `NullStore` is also the `memory` store backend of the node.

pub mod clock;
pub mod executor;
pub mod store;

pub use clock::NullClock;
pub use executor::{NullExecutor, RecordedCall};
pub use store::NullStore;
