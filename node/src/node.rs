//! The Agora node: governance controller, HTTP API and drain workers.

use agora_governance::{DrainReport, EffectExecutor, GovernanceController};
use agora_nullables::NullStore;
use agora_rpc::{RpcServer, RpcState};
use agora_store::GovernanceStore;
use agora_store_lmdb::LmdbStore;
use agora_types::SystemClock;
use agora_utils::GovernanceMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::drain::DrainWorker;
use crate::executor::HttpExecutor;
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// How long [`AgoraNode::stop`] waits for tasks before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Open the durable LMDB store under `config.data_dir`.
pub fn open_lmdb(config: &NodeConfig) -> Result<Arc<LmdbStore>, NodeError> {
    let store = LmdbStore::open(&config.data_dir, config.lmdb_map_size)?;
    tracing::info!(path = %config.data_dir.display(), "LMDB store opened");
    Ok(Arc::new(store))
}

/// A throwaway in-memory store.
pub fn open_memory() -> Arc<NullStore> {
    tracing::warn!("using in-memory store; all governance state is lost on exit");
    Arc::new(NullStore::new())
}

/// An Agora node over store backend `S`.
///
/// [`new`](Self::new) wires the governance components; [`start`](Self::start)
/// spawns the HTTP server and drain workers; [`stop`](Self::stop) signals them
/// and waits for in-flight drain passes to settle.
pub struct AgoraNode<S> {
    config: NodeConfig,
    gov: Arc<GovernanceController<S>>,
    metrics: Arc<GovernanceMetrics>,
    executor: Option<Arc<dyn EffectExecutor>>,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
}

impl<S: GovernanceStore + 'static> AgoraNode<S> {
    pub fn new(config: NodeConfig, store: Arc<S>) -> Result<Self, NodeError> {
        let executor = match &config.executor_url {
            Some(url) => {
                let timeout = Duration::from_secs(config.executor_timeout_secs);
                Some(Arc::new(HttpExecutor::new(url.clone(), timeout)?) as Arc<dyn EffectExecutor>)
            }
            None => None,
        };
        Self::with_executor(config, store, executor)
    }

    /// Build a node around an explicit executor (or none).
    pub fn with_executor(
        config: NodeConfig,
        store: Arc<S>,
        executor: Option<Arc<dyn EffectExecutor>>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let gov = Arc::new(GovernanceController::new(
            store,
            Arc::new(SystemClock),
            config.drain_config(),
        ));
        Ok(Self {
            gov,
            metrics: Arc::new(GovernanceMetrics::new()?),
            executor,
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn governance(&self) -> &Arc<GovernanceController<S>> {
        &self.gov
    }

    pub fn metrics(&self) -> &Arc<GovernanceMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    fn worker(&self, executor: &Arc<dyn EffectExecutor>, index: usize) -> DrainWorker<S> {
        DrainWorker::new(
            Arc::clone(&self.gov),
            Arc::clone(executor),
            Arc::clone(&self.metrics),
            format!("agora-{}-{index}", std::process::id()),
        )
    }

    /// Spawn the HTTP server and drain workers.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        tracing::info!(
            store = ?self.config.store,
            rpc = self.config.enable_rpc,
            executor = self.config.executor_url.as_deref().unwrap_or("none"),
            "Agora node starting"
        );

        // ── HTTP API ─────────────────────────────────────────────────────
        if self.config.enable_rpc {
            let server = RpcServer::new(
                self.config.rpc_addr()?,
                RpcState::new(Arc::clone(&self.gov), Arc::clone(&self.metrics)),
            );
            let signalled = self.shutdown.signalled();
            let rpc_handle = tokio::spawn(async move {
                match server.serve(signalled).await {
                    Ok(()) => tracing::info!("RPC server exited"),
                    Err(e) => tracing::error!("RPC server error: {e}"),
                }
            });
            self.task_handles.push(rpc_handle);
        }

        // ── Drain workers ────────────────────────────────────────────────
        match self.executor.clone() {
            Some(executor) => {
                for index in 0..self.config.drain_workers {
                    let worker = self.worker(&executor, index);
                    let interval = self.config.drain_interval();
                    let shutdown_rx = self.shutdown.subscribe();
                    self.task_handles
                        .push(tokio::spawn(worker.run(interval, shutdown_rx)));
                }
            }
            None => {
                tracing::warn!("no executor_url configured; execution queue will not be drained");
            }
        }

        Ok(())
    }

    /// One drain pass, for the `drain` operator command.
    pub async fn drain_once(&self) -> Result<DrainReport, NodeError> {
        let executor = self.executor.as_ref().ok_or(NodeError::NoExecutor)?;
        Ok(self.worker(executor, 0).run_once().await?)
    }

    /// Block until SIGINT or SIGTERM.
    pub async fn wait_for_signal(&self) {
        self.shutdown.wait_for_signal().await;
    }

    /// Signal every task and wait for them to finish.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("Agora node stopping");
        self.shutdown.shutdown();

        let handles = std::mem::take(&mut self.task_handles);
        let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "task ended abnormally");
                }
            }
        })
        .await;
        if joined.is_err() {
            return Err(NodeError::ShutdownTimeout);
        }
        tracing::info!("Agora node stopped");
        Ok(())
    }
}
