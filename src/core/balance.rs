//! Balance checks, `work → nofunds` suspension and NoFunds recovery.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::core::alert::AlertHandle;
use crate::core::error::OrchestratorError;
use crate::core::schedule::distribute_slots;
use crate::core::store::{TaskStore, TaskUpdate, UpdateOp, UpdateOutcome};
use crate::core::task::{TaskId, TaskRecord, TaskStatus, UserAccount};
use crate::util::clock::Clock;

/// Cross-cutting balance gate used by the pipeline and the recovery scan.
#[derive(Clone)]
pub struct BalanceGate {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    alerts: AlertHandle,
    price_per_action: Decimal,
    default_window: Duration,
    minimum_interval: Duration,
}

impl BalanceGate {
    /// Create a gate.
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        alerts: AlertHandle,
        price_per_action: Decimal,
        default_window: Duration,
        minimum_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            alerts,
            price_per_action,
            default_window,
            minimum_interval,
        }
    }

    /// Price of one action.
    pub const fn price_per_action(&self) -> Decimal {
        self.price_per_action
    }

    /// Cost of `actions` actions.
    pub fn cost_of(&self, actions: u32) -> Decimal {
        Decimal::from(actions) * self.price_per_action
    }

    /// `balance >= remaining * price`.
    pub fn covers_remaining(&self, user: &UserAccount, task: &TaskRecord) -> bool {
        user.balance >= self.cost_of(task.remaining_actions())
    }

    /// `balance >= price`.
    pub fn covers_one_action(&self, user: &UserAccount) -> bool {
        user.balance >= self.price_per_action
    }

    /// Move a `work` record to `nofunds`. Schedule is left untouched.
    pub async fn suspend(
        &self,
        task: &TaskRecord,
        user: &UserAccount,
        required: Decimal,
    ) -> Result<UpdateOutcome, OrchestratorError> {
        let err = OrchestratorError::InsufficientBalance {
            user: user.id,
            required,
            available: user.balance,
        };
        info!(task_id = %task.id, "{err}; suspending");
        self.alerts.send("balance", &err, self.clock.now());

        let outcome = self
            .store
            .update_task(
                task.id,
                TaskUpdate::new()
                    .when_status(TaskStatus::Work)
                    .op(UpdateOp::SetStatus(TaskStatus::NoFunds)),
            )
            .await?;
        if !outcome.is_applied() {
            warn!(task_id = %task.id, ?outcome, "suspend not applied");
        }
        Ok(outcome)
    }

    /// Resume `nofunds` records whose owner can now pay strictly more than the
    /// remaining cost. Each gets a fresh default-window schedule from now.
    pub async fn resume_funded(&self) -> Result<Vec<TaskId>, OrchestratorError> {
        let now = self.clock.now();
        let mut resumed = Vec::new();

        for task in self.store.find_by_status(TaskStatus::NoFunds).await? {
            let Some(user) = self.store.get_user(task.user).await? else {
                let err = OrchestratorError::UserMissing(task.user);
                warn!(task_id = %task.id, "{err}");
                self.alerts.send("balance", &err, now);
                continue;
            };

            let remaining = task.remaining_actions();
            if user.balance <= self.cost_of(remaining) {
                debug!(task_id = %task.id, "still unfunded");
                continue;
            }

            let slots = distribute_slots(now, self.default_window, remaining, self.minimum_interval);
            let outcome = self
                .store
                .update_task(
                    task.id,
                    TaskUpdate::new()
                        .when_status(TaskStatus::NoFunds)
                        .op(UpdateOp::SetSchedule(slots))
                        .op(UpdateOp::SetStatus(TaskStatus::Work)),
                )
                .await?;
            if outcome.is_applied() {
                info!(task_id = %task.id, remaining, "resumed funded task");
                resumed.push(task.id);
            } else {
                warn!(task_id = %task.id, ?outcome, "resume not applied");
            }
        }

        Ok(resumed)
    }
}
