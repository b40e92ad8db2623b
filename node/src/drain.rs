//! Background drain workers for the execution queue.

use agora_governance::{DrainReport, EffectExecutor, GovernanceController, GovernanceError};
use agora_store::GovernanceStore;
use agora_utils::{format_duration, GovernanceMetrics};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// One lease-holding consumer of the execution queue.
///
/// Several workers, in this process or others sharing the store, may drain
/// at once: claiming is transactional, so each due entry goes to one worker.
pub struct DrainWorker<S> {
    gov: Arc<GovernanceController<S>>,
    executor: Arc<dyn EffectExecutor>,
    metrics: Arc<GovernanceMetrics>,
    name: String,
}

impl<S: GovernanceStore + 'static> DrainWorker<S> {
    pub fn new(
        gov: Arc<GovernanceController<S>>,
        executor: Arc<dyn EffectExecutor>,
        metrics: Arc<GovernanceMetrics>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            gov,
            executor,
            metrics,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a single drain pass at the controller clock's current time.
    pub async fn run_once(&self) -> Result<DrainReport, GovernanceError> {
        let started = Instant::now();
        let now = self.gov.clock().now();
        let report = self
            .gov
            .scheduler
            .drain_due_entries(now, &self.name, self.executor.as_ref())
            .await?;
        self.metrics
            .drain_duration_secs
            .observe(started.elapsed().as_secs_f64());
        self.metrics
            .record_drain(report.executed, report.retried, report.failed, report.lost);
        if report.claimed > 0 {
            tracing::info!(
                worker = %self.name,
                executor = self.executor.name(),
                claimed = report.claimed,
                executed = report.executed,
                retried = report.retried,
                failed = report.failed,
                lost = report.lost,
                "drain pass finished"
            );
        } else {
            tracing::trace!(worker = %self.name, "nothing due");
        }
        Ok(report)
    }

    /// Drain every `interval` until shutdown is signalled.
    pub async fn run(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            worker = %self.name,
            interval = %format_duration(interval.as_secs()),
            "drain worker started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(worker = %self.name, "drain worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(worker = %self.name, error = %e, "drain pass failed");
                    }
                }
            }
        }
    }
}
