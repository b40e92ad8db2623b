//! Shared utilities for Agora.

pub mod logging;
pub mod metrics;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use metrics::GovernanceMetrics;
pub use time::format_duration;
