//! Reconciliation of recorded progress against external counts.
//!
//! A record is eligible when it is in `work`, its aggregate made count meets
//! the target, and it has not been picked within the gate period. Each run
//! stamps `last_retry_date` on the picked records before querying anything.
//!
//! Per picked record, every review's own contribution is
//! `current external count − baseline`, compared against the recorded
//! progress:
//!
//! - all reviews agree: `work → completed`.
//! - mismatch, `retry_amount < threshold`: only `retry_amount += 1`.
//! - mismatch, `retry_amount >= threshold`: progress is overwritten with the
//!   external truth, one make-up slot is appended per missing action and
//!   `retry_amount` resets to 0. With nothing missing, `retry_amount` is
//!   incremented instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::alert::AlertHandle;
use crate::core::error::OrchestratorError;
use crate::core::executor::ReviewCounter;
use crate::core::schedule::makeup_slots;
use crate::core::store::{TaskStore, TaskUpdate, UpdateOp};
use crate::core::task::{ReviewProgress, ReviewTarget, TaskId, TaskRecord, TaskStatus};
use crate::util::clock::{to_delta, Clock};

const ALERT_SOURCE: &str = "reconcile";

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Records picked this run.
    pub picked: Vec<TaskId>,
    /// Marked completed.
    pub completed: Vec<TaskId>,
    /// Mismatch below the threshold; retry counter bumped.
    pub deferred: Vec<TaskId>,
    /// Counters overwritten and make-up slots appended.
    pub corrected: Vec<TaskId>,
    /// External query failed; left untouched.
    pub skipped: Vec<TaskId>,
}

/// Tuning for [`ReconciliationService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Records processed per run.
    pub max_per_run: usize,
    /// `retry_amount` at which a mismatch is corrected.
    pub drift_threshold: u32,
    /// Minimum time between two picks of the same record.
    pub gate: Duration,
    /// Spacing of make-up slots.
    pub minimum_interval: Duration,
}

enum Verdict {
    Agree,
    Mismatch {
        actual: Vec<ReviewProgress>,
        missing: u32,
    },
}

/// Periodic reconciliation job.
#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn TaskStore>,
    counter: Arc<dyn ReviewCounter>,
    clock: Arc<dyn Clock>,
    alerts: AlertHandle,
    settings: ReconcileSettings,
}

impl ReconciliationService {
    /// Create the service.
    pub fn new(
        store: Arc<dyn TaskStore>,
        counter: Arc<dyn ReviewCounter>,
        clock: Arc<dyn Clock>,
        alerts: AlertHandle,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            counter,
            clock,
            alerts,
            settings,
        }
    }

    /// Run one reconciliation pass.
    pub async fn run(&self) -> Result<ReconcileReport, OrchestratorError> {
        let now = self.clock.now();
        let mut report = ReconcileReport::default();

        let mut eligible: Vec<TaskRecord> = self
            .store
            .find_by_status(TaskStatus::Work)
            .await?
            .into_iter()
            .filter(|t| t.remaining_actions() == 0 && self.gate_open(t.last_retry_date, now))
            .collect();
        // never-picked first, then the longest waiting
        eligible.sort_by_key(|t| t.last_retry_date);
        eligible.truncate(self.settings.max_per_run);

        let mut picked = Vec::with_capacity(eligible.len());
        for task in eligible {
            let outcome = self
                .store
                .update_task(
                    task.id,
                    TaskUpdate::new()
                        .when_status(TaskStatus::Work)
                        .op(UpdateOp::SetLastRetryDate(now)),
                )
                .await?;
            if outcome.is_applied() {
                report.picked.push(task.id);
                picked.push(task);
            } else {
                debug!(task_id = %task.id, ?outcome, "record changed before reconciliation");
            }
        }

        for task in picked {
            let verdict = match self.compare(&task).await {
                Ok(verdict) => verdict,
                Err(err) => {
                    warn!(task_id = %task.id, "{err}; skipping");
                    self.alerts.send(ALERT_SOURCE, &err, now);
                    report.skipped.push(task.id);
                    continue;
                }
            };
            self.apply(&task, verdict, now, &mut report).await?;
        }

        if !report.picked.is_empty() {
            info!(
                picked = report.picked.len(),
                completed = report.completed.len(),
                deferred = report.deferred.len(),
                corrected = report.corrected.len(),
                skipped = report.skipped.len(),
                "reconciliation run finished"
            );
        }
        Ok(report)
    }

    fn gate_open(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last.is_none_or(|last| now - last >= to_delta(self.settings.gate))
    }

    async fn compare(&self, task: &TaskRecord) -> Result<Verdict, OrchestratorError> {
        let mut actual = Vec::with_capacity(task.reviews.len());
        let mut mismatch = false;
        let mut missing = 0u32;

        for review in &task.reviews {
            let counts = self
                .counter
                .review_counts(&task.article, &review.review_id)
                .await
                .map_err(|e| OrchestratorError::ReconciliationQueryFailure {
                    task: task.id,
                    review_id: review.review_id.clone(),
                    reason: e.to_string(),
                })?;

            let (base_likes, base_dislikes) = task
                .baseline_for(&review.review_id)
                .map_or((0, 0), |b| (b.initial_likes, b.initial_dislikes));
            let likes = own_share(counts.likes, base_likes);
            let dislikes = own_share(counts.dislikes, base_dislikes);

            let (recorded_likes, recorded_dislikes) = task
                .progress_for(&review.review_id)
                .map_or((0, 0), |p| (p.likes_made, p.dislikes_made));
            if likes != recorded_likes || dislikes != recorded_dislikes {
                mismatch = true;
                missing = missing.saturating_add(shortfall(review, likes, dislikes));
            }

            actual.push(ReviewProgress {
                review_id: review.review_id.clone(),
                likes_made: likes,
                dislikes_made: dislikes,
            });
        }

        Ok(if mismatch {
            Verdict::Mismatch { actual, missing }
        } else {
            Verdict::Agree
        })
    }

    async fn apply(
        &self,
        task: &TaskRecord,
        verdict: Verdict,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<(), OrchestratorError> {
        let update = TaskUpdate::new().when_status(TaskStatus::Work);
        let (update, bucket) = match verdict {
            Verdict::Agree => (
                update
                    .op(UpdateOp::SetStatus(TaskStatus::Completed))
                    .op(UpdateOp::SetEndedDate(Some(now))),
                &mut report.completed,
            ),
            Verdict::Mismatch { .. } if task.retry_amount < self.settings.drift_threshold => {
                (update.op(UpdateOp::IncrementRetryAmount), &mut report.deferred)
            }
            Verdict::Mismatch { actual, missing: 0 } => (
                update
                    .op(UpdateOp::OverwriteProgress(actual))
                    .op(UpdateOp::IncrementRetryAmount),
                &mut report.corrected,
            ),
            Verdict::Mismatch { actual, missing } => {
                let slots =
                    makeup_slots(&task.schedule, now, missing, self.settings.minimum_interval);
                (
                    update
                        .op(UpdateOp::OverwriteProgress(actual))
                        .op(UpdateOp::PushSchedule(slots))
                        .op(UpdateOp::SetRetryAmount(0)),
                    &mut report.corrected,
                )
            }
        };

        let outcome = self.store.update_task(task.id, update).await?;
        if outcome.is_applied() {
            bucket.push(task.id);
        } else {
            warn!(task_id = %task.id, ?outcome, "reconciliation update not applied");
        }
        Ok(())
    }
}

/// This task's contribution to an external count, clamped at zero.
fn own_share(current: u64, baseline: u64) -> u32 {
    u32::try_from(current.saturating_sub(baseline)).unwrap_or(u32::MAX)
}

/// Actions still owed on `review` given what the platform shows.
fn shortfall(review: &ReviewTarget, likes: u32, dislikes: u32) -> u32 {
    review
        .desired_likes
        .saturating_sub(likes)
        .saturating_add(review.desired_dislikes.saturating_sub(dislikes))
}
