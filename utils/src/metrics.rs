//! Prometheus metrics for the governance service.
//!
//! [`GovernanceMetrics`] owns a dedicated [`Registry`] that the RPC
//! `/metrics` endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct GovernanceMetrics {
    pub registry: Registry,

    /// Quorum evaluations that resolved a proposal, by outcome (`passed`/`failed`).
    pub evaluations: IntCounterVec,
    pub delegations_created: IntCounter,
    pub delegations_revoked: IntCounter,
    /// Delegations refused because the delegate was at the cap.
    pub delegation_cap_rejections: IntCounter,
    pub votes_cast: IntCounter,
    pub executions_queued: IntCounter,
    pub executions_succeeded: IntCounter,
    pub executions_retried: IntCounter,
    pub executions_failed: IntCounter,
    /// Claims lost to another worker after the lease lapsed.
    pub executions_lost: IntCounter,
    /// Wall time of one drain pass, in seconds.
    pub drain_duration_secs: Histogram,
    /// HTTP requests by route and status class.
    pub http_requests: IntCounterVec,
}

impl GovernanceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let evaluations = register_int_counter_vec_with_registry!(
            Opts::new(
                "agora_quorum_evaluations_total",
                "Proposals resolved by quorum evaluation"
            ),
            &["outcome"],
            registry
        )?;

        let delegations_created = register_int_counter_with_registry!(
            Opts::new("agora_delegations_created_total", "Delegations created"),
            registry
        )?;

        let delegations_revoked = register_int_counter_with_registry!(
            Opts::new("agora_delegations_revoked_total", "Delegations revoked"),
            registry
        )?;

        let delegation_cap_rejections = register_int_counter_with_registry!(
            Opts::new(
                "agora_delegation_cap_rejections_total",
                "Delegations refused by the per-delegate cap"
            ),
            registry
        )?;

        let votes_cast = register_int_counter_with_registry!(
            Opts::new("agora_votes_cast_total", "Ballots recorded"),
            registry
        )?;

        let executions_queued = register_int_counter_with_registry!(
            Opts::new(
                "agora_executions_queued_total",
                "Passed proposals queued behind the timelock"
            ),
            registry
        )?;

        let executions_succeeded = register_int_counter_with_registry!(
            Opts::new(
                "agora_executions_succeeded_total",
                "Queue entries executed successfully"
            ),
            registry
        )?;

        let executions_retried = register_int_counter_with_registry!(
            Opts::new(
                "agora_executions_retried_total",
                "Executor attempts that failed and were rescheduled"
            ),
            registry
        )?;

        let executions_failed = register_int_counter_with_registry!(
            Opts::new(
                "agora_executions_failed_total",
                "Queue entries that exhausted their retries"
            ),
            registry
        )?;

        let executions_lost = register_int_counter_with_registry!(
            Opts::new(
                "agora_executions_lost_total",
                "Executor outcomes discarded because the lease was lost"
            ),
            registry
        )?;

        // 1 ms → ~32 s.
        let drain_duration_secs = register_histogram_with_registry!(
            HistogramOpts::new("agora_drain_duration_seconds", "Duration of one drain pass")
                .buckets(prometheus::exponential_buckets(0.001, 2.0, 16)?),
            registry
        )?;

        let http_requests = register_int_counter_vec_with_registry!(
            Opts::new("agora_http_requests_total", "HTTP requests served"),
            &["route", "status"],
            registry
        )?;

        Ok(Self {
            registry,
            evaluations,
            delegations_created,
            delegations_revoked,
            delegation_cap_rejections,
            votes_cast,
            executions_queued,
            executions_succeeded,
            executions_retried,
            executions_failed,
            executions_lost,
            drain_duration_secs,
            http_requests,
        })
    }

    /// Record the counts of one drain pass.
    pub fn record_drain(&self, executed: usize, retried: usize, failed: usize, lost: usize) {
        self.executions_succeeded.inc_by(executed as u64);
        self.executions_retried.inc_by(retried as u64);
        self.executions_failed.inc_by(failed as u64);
        self.executions_lost.inc_by(lost as u64);
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = GovernanceMetrics::new().unwrap();
        metrics.evaluations.with_label_values(&["failed"]).inc();
        metrics.record_drain(2, 1, 0, 0);
        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"agora_quorum_evaluations_total{outcome="failed"} 1"#));
        assert!(text.contains("agora_executions_succeeded_total 2"));
        assert!(text.contains("agora_executions_retried_total 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = GovernanceMetrics::new().unwrap();
        let b = GovernanceMetrics::new().unwrap();
        a.votes_cast.inc();
        assert_eq!(a.votes_cast.get(), 1);
        assert_eq!(b.votes_cast.get(), 0);
    }
}
