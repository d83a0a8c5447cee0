//! Integration tests for reconciliation against external review counts
//!
//! - Agreement completes the record
//! - Mismatch below the drift threshold only bumps `retry_amount`
//! - Confirmed drift overwrites progress and appends make-up slots
//! - Per-run cap and the re-pick gate
//! - Query failures leave the record untouched

mod common;

use std::time::Duration;

use chrono::TimeDelta;

use common::*;
use likes_orchestrator::config::OrchestratorConfig;
use likes_orchestrator::core::{
    AlertHandle, MaintenanceJob, ReconciliationService, ReviewTarget, TaskStatus,
};

fn service(h: &Harness) -> ReconciliationService {
    ReconciliationService::new(
        h.store.clone(),
        h.counter.clone(),
        h.clock.clone(),
        AlertHandle::new(h.alerts.clone()),
        OrchestratorConfig::default().reconcile_settings(),
    )
}

// ============================================================================
// VERDICTS
// ============================================================================

#[tokio::test]
async fn test_agreeing_counts_complete_the_task() {
    let h = Harness::new();
    let user = h.user(100);
    let task = exhausted_task(user, "r1", 2, 10);
    h.store.put_task(task.clone());
    h.counter.set("r1", 12, 0);

    let report = service(&h).run().await.unwrap();

    assert_eq!(report.picked, vec![task.id]);
    assert_eq!(report.completed, vec![task.id]);
    let stored = h.task(task.id);
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.ended_date, Some(t0()));
    assert_eq!(stored.last_retry_date, Some(t0()));
}

#[tokio::test]
async fn test_mismatch_below_threshold_is_deferred() {
    let h = Harness::new();
    let user = h.user(100);
    let task = exhausted_task(user, "r1", 2, 10);
    h.store.put_task(task.clone());
    h.counter.set("r1", 11, 0);

    let report = service(&h).run().await.unwrap();

    assert_eq!(report.deferred, vec![task.id]);
    let stored = h.task(task.id);
    assert_eq!(stored.status, TaskStatus::Work);
    assert_eq!(stored.retry_amount, 1);
    assert_eq!(stored.total_likes_made, 2);
    assert!(stored.schedule.is_empty());
}

#[tokio::test]
async fn test_confirmed_drift_appends_makeup_slots() {
    let h = Harness::new();
    let user = h.user(100);
    let mut task = exhausted_task(user, "r1", 4, 10);
    task.retry_amount = 5;
    h.store.put_task(task.clone());
    // recorded 4, the platform shows only 2 of ours
    h.counter.set("r1", 12, 0);

    let report = service(&h).run().await.unwrap();

    assert_eq!(report.corrected, vec![task.id]);
    let stored = h.task(task.id);
    assert_eq!(stored.status, TaskStatus::Work);
    assert_eq!(stored.schedule, vec![t0(), t0() + min_gap()]);
    assert_eq!(stored.result_reviews[0].likes_made, 2);
    assert_eq!(stored.total_likes_made, 2);
    assert_eq!(stored.total_amount_made, 2);
    assert!(stored.counters_consistent());
    assert_eq!(stored.retry_amount, 0);
}

#[tokio::test]
async fn test_makeup_slots_follow_existing_schedule() {
    let h = Harness::new();
    let user = h.user(100);
    let mut task = exhausted_task(user, "r1", 3, 0);
    task.retry_amount = 5;
    task.schedule = vec![t0() + TimeDelta::hours(1)];
    h.store.put_task(task.clone());
    h.counter.set("r1", 2, 0);

    service(&h).run().await.unwrap();

    let last = t0() + TimeDelta::hours(1);
    assert_eq!(h.task(task.id).schedule, vec![last, last + min_gap()]);
}

#[tokio::test]
async fn test_drift_with_nothing_missing_bumps_retry() {
    let h = Harness::new();
    let user = h.user(100);
    let mut task = exhausted_task(user, "r1", 2, 10);
    task.retry_amount = 5;
    h.store.put_task(task.clone());
    // more of ours than recorded
    h.counter.set("r1", 15, 0);

    let report = service(&h).run().await.unwrap();

    assert_eq!(report.corrected, vec![task.id]);
    let stored = h.task(task.id);
    assert_eq!(stored.result_reviews[0].likes_made, 5);
    assert_eq!(stored.total_amount_made, 5);
    assert_eq!(stored.retry_amount, 6);
    assert!(stored.schedule.is_empty());
    assert_eq!(stored.status, TaskStatus::Work);
}

#[tokio::test]
async fn test_counts_below_baseline_clamp_to_zero() {
    let h = Harness::new();
    let user = h.user(100);
    let mut task = exhausted_task(user, "r1", 1, 10);
    task.retry_amount = 5;
    h.store.put_task(task.clone());
    h.counter.set("r1", 7, 0);

    service(&h).run().await.unwrap();

    let stored = h.task(task.id);
    assert_eq!(stored.result_reviews[0].likes_made, 0);
    assert_eq!(stored.schedule, vec![t0()]);
}

// ============================================================================
// SELECTION
// ============================================================================

#[tokio::test]
async fn test_unfinished_tasks_are_not_picked() {
    let h = Harness::new();
    let user = h.user(100);
    let task = work_task(user, vec![ReviewTarget::new("r1", 2, 0)], vec![t0()]);
    h.store.put_task(task.clone());

    let report = service(&h).run().await.unwrap();

    assert!(report.picked.is_empty());
    assert_eq!(h.task(task.id).last_retry_date, None);
}

#[tokio::test]
async fn test_run_is_capped_and_gated() {
    let h = Harness::new();
    let user = h.user(100);
    for _ in 0..5 {
        h.store.put_task(exhausted_task(user, "r1", 2, 0));
    }
    // always disagree so every record stays in work
    h.counter.set("r1", 1, 0);
    let svc = service(&h);

    let first = svc.run().await.unwrap();
    assert_eq!(first.picked.len(), 3);
    assert_eq!(first.deferred.len(), 3);

    let second = svc.run().await.unwrap();
    assert_eq!(second.picked.len(), 2);
    assert!(second.picked.iter().all(|id| !first.picked.contains(id)));

    let third = svc.run().await.unwrap();
    assert!(third.picked.is_empty());

    h.clock.advance(Duration::from_secs(1800));
    let fourth = svc.run().await.unwrap();
    assert_eq!(fourth.picked.len(), 3);
}

#[tokio::test]
async fn test_query_failure_skips_record() {
    let h = Harness::new();
    let user = h.user(100);
    let task = exhausted_task(user, "r1", 2, 10);
    h.store.put_task(task.clone());
    h.counter.fail("r1");

    let report = service(&h).run().await.unwrap();

    assert_eq!(report.skipped, vec![task.id]);
    assert!(h.alerted("reconciliation query failed"));
    let stored = h.task(task.id);
    assert_eq!(stored.status, TaskStatus::Work);
    assert_eq!(stored.retry_amount, 0);
    assert_eq!(stored.last_retry_date, Some(t0()));
}

#[tokio::test]
async fn test_orchestrator_job_runs_reconciliation() {
    let h = Harness::new();
    let user = h.user(100);
    let task = exhausted_task(user, "r1", 2, 0);
    h.store.put_task(task.clone());
    h.counter.set("r1", 2, 0);

    h.orchestrator.run_job(MaintenanceJob::Reconcile).await.unwrap();

    assert_eq!(h.task(task.id).status, TaskStatus::Completed);
}
