//! Intake: promotes `created` records to `work`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::alert::AlertHandle;
use crate::core::error::OrchestratorError;
use crate::core::schedule::{distribute_slots, initial_window};
use crate::core::store::{TaskStore, TaskUpdate, UpdateOp};
use crate::core::task::{AccountsUsed, TaskId, TaskRecord, TaskStatus};
use crate::util::clock::Clock;

/// Promotes due `created` records and writes their initial schedule.
#[derive(Clone)]
pub struct Intake {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    alerts: AlertHandle,
    default_window: Duration,
    minimum_interval: Duration,
}

impl Intake {
    /// Create an intake scanner.
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        alerts: AlertHandle,
        default_window: Duration,
        minimum_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            alerts,
            default_window,
            minimum_interval,
        }
    }

    /// Promote every `created` record whose `date_start` has passed (or is
    /// unset). A failure on one record is alerted and does not stop the scan.
    pub async fn promote_due(&self) -> Result<Vec<TaskId>, OrchestratorError> {
        let now = self.clock.now();
        let mut promoted = Vec::new();

        for task in self.store.find_by_status(TaskStatus::Created).await? {
            if task.date_start.is_some_and(|start| start > now) {
                debug!(task_id = %task.id, "not yet due");
                continue;
            }
            match self.promote(&task).await {
                Ok(true) => promoted.push(task.id),
                Ok(false) => {}
                Err(err) => {
                    warn!(task_id = %task.id, "intake failed: {err}");
                    self.alerts.send("intake", &err, now);
                }
            }
        }

        Ok(promoted)
    }

    async fn promote(&self, task: &TaskRecord) -> Result<bool, OrchestratorError> {
        let now = self.clock.now();
        let accounts_used = self.reuse_guard(task).await?;
        let (start, window) = initial_window(task.date_start, task.date_end, now, self.default_window);
        let schedule = distribute_slots(start, window, task.total, self.minimum_interval);
        let slots = schedule.len();

        let outcome = self
            .store
            .update_task(
                task.id,
                TaskUpdate::new()
                    .when_status(TaskStatus::Created)
                    .op(UpdateOp::ResetProgress)
                    .op(UpdateOp::SetAccountsUsed(accounts_used))
                    .op(UpdateOp::SetSchedule(schedule))
                    .op(UpdateOp::SetStatus(TaskStatus::Work)),
            )
            .await?;

        if outcome.is_applied() {
            info!(task_id = %task.id, slots, "task promoted to work");
        } else {
            warn!(task_id = %task.id, ?outcome, "promotion not applied");
        }
        Ok(outcome.is_applied())
    }

    /// Numbers other records already used on each of this record's reviews.
    async fn reuse_guard(&self, task: &TaskRecord) -> Result<Vec<AccountsUsed>, OrchestratorError> {
        let mut guard = Vec::with_capacity(task.reviews.len());
        for review in &task.reviews {
            let numbers: BTreeSet<String> = self
                .store
                .find_by_review(&review.review_id)
                .await?
                .iter()
                .filter(|other| other.id != task.id)
                .flat_map(|other| other.numbers_used_on(&review.review_id).iter().cloned())
                .collect();
            guard.push(AccountsUsed {
                review_id: review.review_id.clone(),
                numbers_used: numbers.into_iter().collect(),
            });
        }
        Ok(guard)
    }
}
