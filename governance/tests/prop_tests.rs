//! Property tests for delegation caps and the timelock.

mod common;

use agora_governance::GovernanceError;
use agora_nullables::NullExecutor;
use agora_types::params::ceil_percentage;
use agora_types::DaoSettings;
use common::*;
use proptest::prelude::*;
use std::collections::HashMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// No delegate ever holds more than ceil(M·d/100) active delegations,
    /// whatever order members delegate and re-delegate in.
    #[test]
    fn delegation_cap_never_exceeded(
        members in 2u64..40,
        cap in 1u32..=100,
        attempts in prop::collection::vec((1u64..40, 1u64..40), 1..80),
    ) {
        let h = Harness::new();
        let dao = h.dao(members, DaoSettings { max_delegation_percentage: cap, ..DaoSettings::default() });
        for (from, to) in attempts {
            let (from, to) = ((from % members) + 1, (to % members) + 1);
            match h.delegate(dao, from, to) {
                Ok(_)
                | Err(GovernanceError::DelegationCapExceeded { .. })
                | Err(GovernanceError::Validation(_)) => {}
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }

        let max_allowed = ceil_percentage(members, cap);
        let mut held: HashMap<u64, u64> = HashMap::new();
        for n in 1..=members {
            for d in h.gov.delegation.list_active_delegations(dao, user(n)).unwrap() {
                *held.entry(d.delegate_id.get()).or_default() += 1;
            }
        }
        for (delegate, count) in held {
            prop_assert!(count <= max_allowed, "delegate {delegate} holds {count} > {max_allowed}");
        }
        for n in 1..=members {
            let active = h.gov.delegation.list_active_delegations(dao, user(n)).unwrap();
            prop_assert!(active.len() <= 1);
        }
    }

    /// The executor is never invoked before an entry's scheduled time.
    #[test]
    fn executor_never_runs_early(delay_hours in 0u32..100, early_by in 1u64..(24 * 3_600)) {
        let h = Harness::new();
        let dao = h.dao(3, DaoSettings { execution_delay_hours: Some(delay_hours), ..DaoSettings::default() });
        let pid = h.passed_proposal(dao, 3);
        let entry = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap().entry;
        let drain_at = agora_types::Timestamp::new(entry.scheduled_for.as_secs() - early_by);

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let executor = NullExecutor::new();
        let report = runtime
            .block_on(h.gov.scheduler.drain_due_entries(drain_at, "prop", &executor))
            .unwrap();
        prop_assert_eq!(report.claimed, 0);
        prop_assert_eq!(executor.call_count(), 0);
    }
}
