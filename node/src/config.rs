//! Node configuration with TOML file support.

use agora_governance::{DrainConfig, RetryPolicy};
use agora_store_lmdb::DEFAULT_MAP_SIZE;
use agora_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::NodeError;

/// Which [`GovernanceStore`](agora_store::GovernanceStore) backs the node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Durable LMDB environment under `data_dir`.
    #[default]
    Lmdb,
    /// In-process store that forgets everything on exit. Development only.
    Memory,
}

/// Configuration for an Agora node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub store: StoreBackend,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to serve the HTTP API.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default = "default_rpc_bind")]
    pub rpc_bind: String,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter, e.g. "info" or "info,agora_governance=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Endpoint the HTTP effect executor posts execution requests to.
    /// Without it the node serves the API but never drains the queue.
    #[serde(default)]
    pub executor_url: Option<String>,

    #[serde(default = "default_executor_timeout_secs")]
    pub executor_timeout_secs: u64,

    /// Seconds between drain passes of each worker.
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    /// Concurrent drain workers in this process.
    #[serde(default = "default_drain_workers")]
    pub drain_workers: usize,

    /// Entries claimed per drain pass.
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,

    /// How long a claimed entry stays invisible to other workers.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./agora_data")
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_true() -> bool {
    true
}

fn default_rpc_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    7080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_executor_timeout_secs() -> u64 {
    60
}

fn default_drain_interval_secs() -> u64 {
    30
}

fn default_drain_workers() -> usize {
    1
}

fn default_drain_batch_size() -> usize {
    32
}

fn default_lease_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_base_backoff_secs() -> u64 {
    RetryPolicy::default().base_backoff_secs
}

fn default_max_backoff_secs() -> u64 {
    RetryPolicy::default().max_backoff_secs
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values that would make the node misbehave rather than fail.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.drain_workers == 0 {
            return Err(NodeError::Config("drain_workers must be at least 1".into()));
        }
        if self.drain_batch_size == 0 {
            return Err(NodeError::Config("drain_batch_size must be at least 1".into()));
        }
        if self.drain_interval_secs == 0 {
            return Err(NodeError::Config("drain_interval_secs must be at least 1".into()));
        }
        if self.lease_secs <= self.executor_timeout_secs {
            return Err(NodeError::Config(format!(
                "lease_secs ({}) must exceed executor_timeout_secs ({})",
                self.lease_secs, self.executor_timeout_secs
            )));
        }
        if self.base_backoff_secs > self.max_backoff_secs {
            return Err(NodeError::Config(
                "base_backoff_secs must not exceed max_backoff_secs".into(),
            ));
        }
        self.rpc_addr()?;
        Ok(())
    }

    pub fn rpc_addr(&self) -> Result<SocketAddr, NodeError> {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
            .parse()
            .map_err(|e| NodeError::Config(format!("invalid RPC address: {e}")))
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            batch_size: self.drain_batch_size,
            lease: Duration::from_secs(self.lease_secs),
            executor_timeout: Duration::from_secs(self.executor_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_backoff_secs: self.base_backoff_secs,
                max_backoff_secs: self.max_backoff_secs,
            },
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreBackend::default(),
            lmdb_map_size: default_map_size(),
            enable_rpc: default_true(),
            rpc_bind: default_rpc_bind(),
            rpc_port: default_rpc_port(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            executor_url: None,
            executor_timeout_secs: default_executor_timeout_secs(),
            drain_interval_secs: default_drain_interval_secs(),
            drain_workers: default_drain_workers(),
            drain_batch_size: default_drain_batch_size(),
            lease_secs: default_lease_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}
