//! Per-task pipeline.
//!
//! One run consumes one schedule slot and attempts at most one action:
//!
//! `Fetch → BalanceCheck → BaselineCapture → ReviewSelect → ResourceAcquire
//! → Execute → Settle → Release → CompletionCheck`
//!
//! The pipeline never touches the active counters. It reports a
//! [`PipelineOutcome`] (or an error) and the work queue decides how the lease
//! ends.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::alert::AlertHandle;
use crate::core::balance::BalanceGate;
use crate::core::error::{ActionError, OrchestratorError, ResourceKind};
use crate::core::executor::{ActionExecutor, ActionRequest, ReviewCounter};
use crate::core::resources::{
    acquire_bounded, Account, AccountRequest, AcquireLimits, Proxy, ResourcePool,
};
use crate::core::retry::FailureClass;
use crate::core::store::{TaskStore, TaskUpdate, UpdateOp};
use crate::core::task::{
    ActionKind, BalanceHistoryEntry, BalanceOperation, DebitEntry, DebitStatus, ReviewBaseline,
    TaskId, TaskRecord, TaskStatus,
};
use crate::util::clock::Clock;

const ALERT_SOURCE: &str = "pipeline";

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// One action settled.
    Settled {
        /// Whether this action completed the task.
        completed: bool,
    },
    /// No action left to make.
    Depleted,
    /// Record or user missing.
    Abandoned,
    /// Balance too low; record moved to `nofunds`.
    NoFunds,
    /// Record is no longer in `work`.
    Inactive,
    /// Failed in a retryable way.
    Retry(FailureClass),
}

/// Collaborators shared by every pipeline run.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn TaskStore>,
    resources: Arc<dyn ResourcePool>,
    executor: Arc<dyn ActionExecutor>,
    counter: Arc<dyn ReviewCounter>,
    clock: Arc<dyn Clock>,
    alerts: AlertHandle,
    gate: BalanceGate,
    acquire: AcquireLimits,
}

impl Pipeline {
    /// Assemble a pipeline.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn TaskStore>,
        resources: Arc<dyn ResourcePool>,
        executor: Arc<dyn ActionExecutor>,
        counter: Arc<dyn ReviewCounter>,
        clock: Arc<dyn Clock>,
        alerts: AlertHandle,
        gate: BalanceGate,
        acquire: AcquireLimits,
    ) -> Self {
        Self {
            store,
            resources,
            executor,
            counter,
            clock,
            alerts,
            gate,
            acquire,
        }
    }

    /// Run one cycle for `task_id`.
    ///
    /// Transient store failures before the action map to
    /// `Retry(Recoverable)`. Any returned error is fatal for this cycle.
    pub async fn run(&self, task_id: TaskId) -> Result<PipelineOutcome, OrchestratorError> {
        match self.run_cycle(task_id).await {
            Err(err) if err.is_transient() => {
                warn!(task_id = %task_id, "recoverable failure: {err}");
                self.alert(&err);
                Ok(PipelineOutcome::Retry(FailureClass::Recoverable))
            }
            other => other,
        }
    }

    async fn run_cycle(&self, task_id: TaskId) -> Result<PipelineOutcome, OrchestratorError> {
        // Fetch
        let Some(task) = self.store.get_task(task_id).await? else {
            let err = OrchestratorError::RecordMissing(task_id);
            warn!("{err}; abandoning");
            self.alert(&err);
            return Ok(PipelineOutcome::Abandoned);
        };
        if task.status != TaskStatus::Work {
            debug!(task_id = %task_id, status = %task.status, "task not in work");
            return Ok(PipelineOutcome::Inactive);
        }
        let Some(user) = self.store.get_user(task.user).await? else {
            let err = OrchestratorError::UserMissing(task.user);
            warn!(task_id = %task_id, "{err}; abandoning");
            self.alert(&err);
            return Ok(PipelineOutcome::Abandoned);
        };

        // BalanceCheck
        let remaining = task.remaining_actions();
        if remaining == 0 {
            self.complete(&task).await?;
            return Ok(PipelineOutcome::Depleted);
        }
        if !self.gate.covers_remaining(&user, &task) {
            self.gate
                .suspend(&task, &user, self.gate.cost_of(remaining))
                .await?;
            return Ok(PipelineOutcome::NoFunds);
        }

        let task = if task.total_amount_made == 0 {
            self.capture_baseline(task).await?
        } else {
            task
        };

        // ReviewSelect
        let Some((review, action)) = task.next_action() else {
            warn!(
                task_id = %task_id,
                remaining,
                "no review needs an action although counters show remaining work"
            );
            return Ok(PipelineOutcome::Depleted);
        };
        let review_id = review.review_id.clone();

        if !self.gate.covers_one_action(&user) {
            self.gate
                .suspend(&task, &user, self.gate.price_per_action())
                .await?;
            return Ok(PipelineOutcome::NoFunds);
        }

        // ResourceAcquire
        let Some((proxy, account)) = self.acquire_resources(&task, &review_id, action).await?
        else {
            return Ok(PipelineOutcome::Retry(FailureClass::ResourceUnavailable));
        };

        // Execute
        let request = ActionRequest {
            phone_number: account.phone_number.clone(),
            proxy: proxy.clone(),
            article: task.article.clone(),
            action,
            account,
            review_id,
        };
        debug!(task_id = %task_id, review_id = %request.review_id, %action, "executing action");
        let executed = self.executor.perform(&request).await;

        let outcome = match executed {
            Ok(true) => self.settle(&task, &request).await,
            Ok(false) => {
                let err = OrchestratorError::ActionFailed(task_id);
                debug!("{err}");
                self.alert(&err);
                Ok(PipelineOutcome::Retry(FailureClass::ActionFailed))
            }
            Err(ActionError::ResourceUnavailable(kind)) => {
                self.alert(&OrchestratorError::ResourceUnavailable(kind));
                Ok(PipelineOutcome::Retry(FailureClass::ResourceUnavailable))
            }
            Err(err @ ActionError::Transient(_)) => {
                warn!(task_id = %task_id, "action error: {err}");
                self.alert(&err);
                Ok(PipelineOutcome::Retry(FailureClass::Recoverable))
            }
        };

        // Release, regardless of outcome
        self.release(proxy, &request.phone_number).await;

        outcome
    }

    async fn capture_baseline(&self, task: TaskRecord) -> Result<TaskRecord, OrchestratorError> {
        let mut baselines = Vec::with_capacity(task.reviews.len());
        for review in &task.reviews {
            let counts = self
                .counter
                .review_counts(&task.article, &review.review_id)
                .await
                .map_err(|e| OrchestratorError::BaselineCapture {
                    task: task.id,
                    reason: format!("review {}: {e}", review.review_id),
                })?;
            baselines.push(ReviewBaseline {
                review_id: review.review_id.clone(),
                initial_likes: counts.likes,
                initial_dislikes: counts.dislikes,
            });
        }

        let outcome = self
            .store
            .update_task(
                task.id,
                TaskUpdate::new().op(UpdateOp::SetInitialReviews(baselines.clone())),
            )
            .await?;
        if !outcome.is_applied() {
            return Err(OrchestratorError::BaselineCapture {
                task: task.id,
                reason: format!("update not applied: {outcome:?}"),
            });
        }
        debug!(task_id = %task.id, "baseline captured");

        Ok(TaskRecord {
            initial_reviews: baselines,
            ..task
        })
    }

    /// `Ok(None)` when a resource ran out; the proxy is returned if the
    /// account could not be obtained.
    async fn acquire_resources(
        &self,
        task: &TaskRecord,
        review_id: &str,
        action: ActionKind,
    ) -> Result<Option<(Proxy, Account)>, OrchestratorError> {
        let resources = &self.resources;
        let proxy = match acquire_bounded(
            self.clock.as_ref(),
            self.acquire,
            ResourceKind::Proxy,
            || resources.try_acquire_proxy(),
        )
        .await
        {
            Ok(proxy) => proxy,
            Err(err @ OrchestratorError::ResourceUnavailable(_)) => {
                warn!(task_id = %task.id, "{err}");
                self.alert(&err);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let exclude = task.numbers_used_on(review_id);
        let account = acquire_bounded(
            self.clock.as_ref(),
            self.acquire,
            ResourceKind::Account,
            || {
                resources.try_acquire_account(AccountRequest {
                    task_id: task.id,
                    review_id,
                    action,
                    exclude,
                })
            },
        )
        .await;

        match account {
            Ok(account) => Ok(Some((proxy, account))),
            Err(err) => {
                self.release_proxy(proxy).await;
                if matches!(err, OrchestratorError::ResourceUnavailable(_)) {
                    warn!(task_id = %task.id, "{err}");
                    self.alert(&err);
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Record progress, reuse guard and ledger for one successful action.
    /// Any failure here is a [`OrchestratorError::LedgerWriteFailure`].
    async fn settle(
        &self,
        task: &TaskRecord,
        request: &ActionRequest,
    ) -> Result<PipelineOutcome, OrchestratorError> {
        let ledger_err = |reason: String| OrchestratorError::LedgerWriteFailure {
            task: task.id,
            reason,
        };
        let now = self.clock.now();
        let price: Decimal = self.gate.price_per_action();

        let outcome = self
            .store
            .update_task(
                task.id,
                TaskUpdate::new()
                    .op(UpdateOp::IncrementProgress {
                        review_id: request.review_id.clone(),
                        action: request.action,
                    })
                    .op(UpdateOp::PushAccountUsed {
                        review_id: request.review_id.clone(),
                        number: request.phone_number.clone(),
                    }),
            )
            .await
            .map_err(|e| ledger_err(e.to_string()))?;
        if !outcome.is_applied() {
            return Err(ledger_err(format!("progress not recorded: {outcome:?}")));
        }

        self.store
            .insert_debit(DebitEntry {
                id: Uuid::new_v4(),
                user: task.user,
                kind: task.kind.clone(),
                task_id: task.id,
                sum: price,
                status: DebitStatus::Created,
                created_at: now,
            })
            .await
            .map_err(|e| ledger_err(format!("debit: {e}")))?;

        self.store
            .insert_balance_history(BalanceHistoryEntry {
                id: Uuid::new_v4(),
                user: task.user,
                sum: price,
                operation: BalanceOperation::Expense,
                basis: format!("{} {}", task.kind, task.id),
                kind: task.kind.clone(),
                date: now,
            })
            .await
            .map_err(|e| ledger_err(format!("balance history: {e}")))?;

        info!(
            task_id = %task.id,
            review_id = %request.review_id,
            action = %request.action,
            "action settled"
        );

        // The action is paid for; a failed completion check must not turn
        // into a retry. The next dispatch or reconciliation picks it up.
        let completed = match self.completion_check(task.id).await {
            Ok(completed) => completed,
            Err(err) => {
                warn!(task_id = %task.id, "completion check failed: {err}");
                false
            }
        };
        Ok(PipelineOutcome::Settled { completed })
    }

    async fn completion_check(&self, task_id: TaskId) -> Result<bool, OrchestratorError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Ok(false);
        };
        if task.remaining_actions() > 0 || task.status == TaskStatus::Completed {
            return Ok(false);
        }
        self.complete(&task).await
    }

    /// `work → completed` with `ended_date = now`; `Ok(false)` if the record
    /// was no longer in `work`.
    async fn complete(&self, task: &TaskRecord) -> Result<bool, OrchestratorError> {
        let outcome = self
            .store
            .update_task(
                task.id,
                TaskUpdate::new()
                    .when_status(TaskStatus::Work)
                    .op(UpdateOp::SetStatus(TaskStatus::Completed))
                    .op(UpdateOp::SetEndedDate(Some(self.clock.now()))),
            )
            .await?;
        if outcome.is_applied() {
            info!(task_id = %task.id, "task completed");
        } else {
            warn!(task_id = %task.id, ?outcome, "completion not applied");
        }
        Ok(outcome.is_applied())
    }

    async fn release(&self, proxy: Proxy, phone_number: &str) {
        self.resources.release_phone_number(phone_number).await;
        self.release_proxy(proxy).await;
    }

    async fn release_proxy(&self, proxy: Proxy) {
        let health = self.resources.probe_proxy(&proxy).await;
        debug!(%proxy, ?health, "releasing proxy");
        self.resources.release_proxy(proxy, health).await;
    }

    fn alert(&self, message: impl std::fmt::Display) {
        self.alerts.send(ALERT_SOURCE, message, self.clock.now());
    }
}
