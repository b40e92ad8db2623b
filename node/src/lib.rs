//! Agora node: runs the governance core as a service.
//!
//! The node ties together:
//! - A store backend (LMDB, or in-memory for development)
//! - The governance controller and its components
//! - The HTTP API
//! - Drain workers that hand due execution entries to the effect executor
//! - Graceful shutdown on SIGINT/SIGTERM

pub mod config;
pub mod drain;
pub mod error;
pub mod executor;
pub mod node;
pub mod shutdown;

pub use config::{NodeConfig, StoreBackend};
pub use drain::DrainWorker;
pub use error::NodeError;
pub use executor::HttpExecutor;
pub use node::{open_lmdb, open_memory, AgoraNode};
pub use shutdown::ShutdownController;
