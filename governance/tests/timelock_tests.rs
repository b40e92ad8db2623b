mod common;

use agora_governance::{DrainConfig, GovernanceError, RetryPolicy};
use agora_nullables::NullExecutor;
use agora_store::{AttemptOutcome, GovernanceStore, ReadTxn, VoteChoice, WriteTxn};
use agora_types::{DaoRole, DaoSettings, ExecutionStatus, ProposalStatus};
use common::*;
use std::time::Duration;

fn fast_retry(max_attempts: u32) -> DrainConfig {
    DrainConfig {
        retry: RetryPolicy {
            max_attempts,
            base_backoff_secs: 60,
            max_backoff_secs: 600,
        },
        ..DrainConfig::default()
    }
}

#[test]
fn enqueue_requires_admin_or_elder() {
    let h = Harness::new();
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);

    let err = h.gov.scheduler.enqueue_execution(pid, user(2)).unwrap_err();
    assert!(matches!(err, GovernanceError::Forbidden(_)));
    assert_eq!(h.store.execution_entry_count(), 0);
    assert_eq!(
        h.gov.voting.get_proposal(pid).unwrap().status,
        ProposalStatus::Passed
    );

    h.set_role(dao, user(2), DaoRole::Elder);
    let outcome = h.gov.scheduler.enqueue_execution(pid, user(2)).unwrap();
    assert!(outcome.newly_queued);
    assert_eq!(outcome.entry.status, ExecutionStatus::Pending);
    assert_eq!(
        h.gov.voting.get_proposal(pid).unwrap().status,
        ProposalStatus::Queued
    );
}

#[test]
fn enqueue_twice_is_a_no_op() {
    let h = Harness::new();
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);
    let first = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap();
    h.clock.advance_hours(5);
    let second = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap();
    assert!(!second.newly_queued);
    assert_eq!(second.entry, first.entry);
    assert_eq!(h.store.execution_entry_count(), 1);
}

#[test]
fn enqueue_active_proposal_is_invalid_state() {
    let h = Harness::new();
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.proposal(dao, None);
    let err = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::InvalidState { status: ProposalStatus::Active, .. }
    ));
}

#[test]
fn enqueue_failed_proposal_reports_why() {
    let h = Harness::new();
    let dao = h.dao(100, DaoSettings::default());
    let pid = h.proposal(dao, None);
    h.vote_range(pid, 1..=10, VoteChoice::Yes);
    h.close_voting();
    h.gov.quorum.evaluate(pid).unwrap();

    let err = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap_err();
    match err {
        GovernanceError::QuorumNotMet { total_votes, required_quorum, .. } => {
            assert_eq!(total_votes, 10);
            assert_eq!(required_quorum, 20);
        }
        other => panic!("unexpected {other:?}"),
    }

    let lost = h.proposal(dao, None);
    h.vote_range(lost, 1..=10, VoteChoice::Yes);
    h.vote_range(lost, 11..=30, VoteChoice::No);
    h.close_voting();
    h.gov.quorum.evaluate(lost).unwrap();
    let err = h.gov.scheduler.enqueue_execution(lost, ADMIN).unwrap_err();
    assert_eq!(err.code(), "MAJORITY_NOT_REACHED");
    assert_eq!(h.store.execution_entry_count(), 0);
}

#[test]
fn dao_override_above_floor_is_used() {
    let h = Harness::new();
    let dao = h.dao(
        4,
        DaoSettings {
            execution_delay_hours: Some(72),
            ..DaoSettings::default()
        },
    );
    let pid = h.passed_proposal(dao, 4);
    let outcome = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap();
    assert_eq!(outcome.delay_hours, 72);
    assert_eq!(outcome.entry.scheduled_for, h.now().plus_hours(72));
}

#[tokio::test]
async fn failed_attempt_backs_off_then_succeeds() {
    let h = Harness::with_drain(fast_retry(5));
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);
    let entry = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap().entry;
    let due = entry.scheduled_for;

    let executor = NullExecutor::new();
    executor.fail_next("treasury locked");
    let first = h.gov.scheduler.drain_due_entries(due, "w1", &executor).await.unwrap();
    assert_eq!(first.retried, 1);

    let stored = h.store.read(|txn| txn.get_execution_entry(pid)).unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Pending);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.next_attempt_at, due.plus_secs(60));
    assert_eq!(stored.last_error.as_deref(), Some("rejected: treasury locked"));

    let waiting = h
        .gov
        .scheduler
        .drain_due_entries(due.plus_secs(30), "w1", &executor)
        .await
        .unwrap();
    assert_eq!(waiting.claimed, 0);

    let second = h
        .gov
        .scheduler
        .drain_due_entries(due.plus_secs(60), "w2", &executor)
        .await
        .unwrap();
    assert_eq!(second.executed, 1);
    assert_eq!(executor.call_count(), 2);

    let stored = h.store.read(|txn| txn.get_execution_entry(pid)).unwrap().unwrap();
    assert_eq!(stored.attempt_log.len(), 2);
    assert!(matches!(stored.attempt_log[0].outcome, AttemptOutcome::Failed { .. }));
    assert_eq!(stored.attempt_log[1].outcome, AttemptOutcome::Succeeded);
    assert_eq!(stored.attempt_log[1].worker, "w2");
}

#[tokio::test]
async fn exhausted_retries_leave_proposal_queued() {
    let h = Harness::with_drain(fast_retry(2));
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);
    let due = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap().entry.scheduled_for;

    let executor = NullExecutor::new();
    executor.always_fail("downstream offline");
    let first = h.gov.scheduler.drain_due_entries(due, "w1", &executor).await.unwrap();
    assert_eq!(first.retried, 1);
    let second = h
        .gov
        .scheduler
        .drain_due_entries(due.plus_hours(1), "w1", &executor)
        .await
        .unwrap();
    assert_eq!(second.failed, 1);

    let stored = h.store.read(|txn| txn.get_execution_entry(pid)).unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert_eq!(stored.attempts, 2);
    assert!(stored.completed_at.is_some());
    assert_eq!(
        h.gov.voting.get_proposal(pid).unwrap().status,
        ProposalStatus::Queued
    );

    let later = h
        .gov
        .scheduler
        .drain_due_entries(due.plus_hours(48), "w1", &executor)
        .await
        .unwrap();
    assert_eq!(later.claimed, 0);
    assert_eq!(executor.call_count(), 2);
}

#[tokio::test]
async fn executor_timeout_releases_for_retry() {
    let h = Harness::with_drain(DrainConfig {
        executor_timeout: Duration::from_millis(20),
        ..fast_retry(3)
    });
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);
    let due = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap().entry.scheduled_for;

    let executor = NullExecutor::new();
    executor.delay(Duration::from_millis(500));
    let report = h.gov.scheduler.drain_due_entries(due, "w1", &executor).await.unwrap();
    assert_eq!(report.retried, 1);

    let stored = h.store.read(|txn| txn.get_execution_entry(pid)).unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Pending);
    assert_eq!(stored.attempt_log[0].outcome, AttemptOutcome::TimedOut);
}

#[tokio::test]
async fn expired_lease_of_crashed_worker_is_reclaimed() {
    let h = Harness::new();
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);
    let due = h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap().entry.scheduled_for;
    let lease_expires_at = due.plus_secs(300);

    h.store
        .write(|txn| {
            let mut entry = txn.get_execution_entry(pid)?.unwrap();
            entry.status = ExecutionStatus::InProgress {
                worker: "crashed".into(),
                lease_expires_at,
            };
            entry.attempts = 1;
            txn.put_execution_entry(&entry)?;
            Ok::<_, GovernanceError>(())
        })
        .unwrap();

    let executor = NullExecutor::new();
    let held = h
        .gov
        .scheduler
        .drain_due_entries(due.plus_secs(10), "w1", &executor)
        .await
        .unwrap();
    assert_eq!(held.claimed, 0);

    let reclaimed = h
        .gov
        .scheduler
        .drain_due_entries(lease_expires_at, "w1", &executor)
        .await
        .unwrap();
    assert_eq!(reclaimed.executed, 1);
    let stored = h.store.read(|txn| txn.get_execution_entry(pid)).unwrap().unwrap();
    assert_eq!(stored.attempts, 2);
    assert_eq!(executor.calls()[0].attempt, 2);
}

#[test]
fn list_queue_is_restricted() {
    let h = Harness::new();
    let dao = h.dao(4, DaoSettings::default());
    let pid = h.passed_proposal(dao, 4);
    h.gov.scheduler.enqueue_execution(pid, ADMIN).unwrap();

    let queue = h.gov.scheduler.list_queue(dao, ADMIN).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].proposal_id, pid);
    assert!(matches!(
        h.gov.scheduler.list_queue(dao, user(3)).unwrap_err(),
        GovernanceError::Forbidden(_)
    ));
}
