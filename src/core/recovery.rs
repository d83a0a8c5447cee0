//! Incomplete-task recovery.
//!
//! Repairs records left `completed` with an end date although fewer actions
//! were made than requested.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::error::OrchestratorError;
use crate::core::schedule::distribute_slots;
use crate::core::store::{TaskStore, TaskUpdate, UpdateOp};
use crate::core::task::{TaskId, TaskStatus};
use crate::util::clock::Clock;

/// Scanner for `completed` records that are short of their target.
#[derive(Clone)]
pub struct IncompleteRecovery {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    default_window: Duration,
    minimum_interval: Duration,
}

impl IncompleteRecovery {
    /// Create a scanner.
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        default_window: Duration,
        minimum_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            default_window,
            minimum_interval,
        }
    }

    /// Put every short `completed` record back to `work` with a fresh
    /// default-window schedule for its remaining actions.
    pub async fn recover(&self) -> Result<Vec<TaskId>, OrchestratorError> {
        let now = self.clock.now();
        let mut recovered = Vec::new();

        let candidates = self.store.find_by_status(TaskStatus::Completed).await?;
        for task in candidates
            .into_iter()
            .filter(|t| t.ended_date.is_some() && t.remaining_actions() > 0)
        {
            let remaining = task.remaining_actions();
            let schedule = distribute_slots(now, self.default_window, remaining, self.minimum_interval);
            let outcome = self
                .store
                .update_task(
                    task.id,
                    TaskUpdate::new()
                        .when_status(TaskStatus::Completed)
                        .op(UpdateOp::SetSchedule(schedule))
                        .op(UpdateOp::SetEndedDate(None))
                        .op(UpdateOp::SetStatus(TaskStatus::Work)),
                )
                .await?;
            if outcome.is_applied() {
                info!(task_id = %task.id, remaining, "incomplete task rescheduled");
                recovered.push(task.id);
            } else {
                warn!(task_id = %task.id, ?outcome, "recovery not applied");
            }
        }

        Ok(recovered)
    }
}
