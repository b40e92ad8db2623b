//! LMDB storage backend for Agora.
//!
//! Implements [`agora_store::GovernanceStore`] using the `heed` LMDB bindings.
//! Each record kind maps to one LMDB database within a single environment.

pub mod environment;
pub mod error;
pub mod store;

pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use store::LmdbStore;
