//! Bounded-concurrency work queue.
//!
//! The queue owns the in-memory list of checked-out tasks and `C` worker loops
//! that drain it. Tasks enter through [`WorkQueue::dispatch_ready`], which
//! removes the schedule head from the store before a task is counted active
//! and queued; that removal is the only de-duplication between dispatch runs.
//!
//! Retried tasks go back to the **front** of the queue. Under a sustained
//! resource shortage they keep priority over freshly dispatched tasks, which
//! can starve new work.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::core::alert::AlertHandle;
use crate::core::counters::{ActiveCounters, ActiveLease, ExitReason};
use crate::core::error::OrchestratorError;
use crate::core::pipeline::{Pipeline, PipelineOutcome};
use crate::core::retry::{
    Exhaustion, FailureClass, RequeuePosition, RetryDecision, RetryState, RetryTable,
};
use crate::core::schedule::escalation_slot;
use crate::core::store::{TaskStore, TaskUpdate, UpdateOp};
use crate::core::task::{TaskId, TaskStatus};
use crate::util::clock::Clock;

const ALERT_SOURCE: &str = "work_queue";

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Snapshot reported by [`WorkQueue::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Tasks waiting for a worker.
    pub queue_length: usize,
    /// Whether any worker is running a pipeline.
    pub is_processing: bool,
    /// Whether dispatch feeds new tasks.
    pub accepting_tasks: bool,
    /// Tasks counted active.
    pub active_count: u64,
    /// Active tasks per kind.
    pub per_type_counts: HashMap<String, u64>,
}

struct QueuedTask {
    task_id: TaskId,
    retries: RetryState,
    lease: ActiveLease,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<QueuedTask>>,
    work_ready: Notify,
    idle: Notify,
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    delayed: AtomicUsize,
    started: AtomicBool,
    shutdown: AtomicBool,
}

impl Shared {
    /// Queue `item`, or release its lease when the queue is shut down. The
    /// flag is read under the queue lock, so an item pushed concurrently with
    /// [`WorkQueue::shutdown`] is either drained by it or released here.
    fn push(&self, item: QueuedTask, position: RequeuePosition) {
        let mut queue = self.queue.lock();
        if self.shutdown.load(Ordering::Acquire) {
            drop(queue);
            debug!(task_id = %item.task_id, "queue shut down; releasing task");
            item.lease.release(ExitReason::Shutdown);
            return;
        }
        match position {
            RequeuePosition::Front => queue.push_front(item),
            RequeuePosition::Back => queue.push_back(item),
        }
        drop(queue);
        self.work_ready.notify_one();
    }

    fn pop(&self) -> Option<QueuedTask> {
        let mut queue = self.queue.lock();
        let item = queue.pop_front()?;
        // counted under the queue lock so idle checks never see a gap
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let more = !queue.is_empty();
        drop(queue);
        if more {
            self.work_ready.notify_one();
        }
        Some(item)
    }

    fn is_idle(&self) -> bool {
        let queue = self.queue.lock();
        queue.is_empty()
            && self.in_flight.load(Ordering::Acquire) == 0
            && self.delayed.load(Ordering::Acquire) == 0
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

struct Inner {
    shared: Shared,
    pipeline: Pipeline,
    counters: Arc<ActiveCounters>,
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    alerts: AlertHandle,
    retry: RetryTable,
    concurrency: usize,
    minimum_interval: Duration,
}

/// Bounded worker pool driving the per-task pipeline.
pub struct WorkQueue<S> {
    inner: Arc<Inner>,
    spawner: S,
}

impl<S: Clone> Clone for WorkQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> WorkQueue<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a queue. Workers start with [`WorkQueue::start`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: Pipeline,
        counters: Arc<ActiveCounters>,
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        alerts: AlertHandle,
        retry: RetryTable,
        concurrency: usize,
        minimum_interval: Duration,
        spawner: S,
    ) -> Self {
        let shared = Shared::default();
        shared.accepting.store(true, Ordering::Release);
        Self {
            inner: Arc::new(Inner {
                shared,
                pipeline,
                counters,
                store,
                clock,
                alerts,
                retry,
                concurrency,
                minimum_interval,
            }),
            spawner,
        }
    }

    /// Spawn the worker loops. Idempotent.
    pub fn start(&self) {
        if self.inner.shared.started.swap(true, Ordering::AcqRel) {
            return;
        }
        for worker in 0..self.inner.concurrency {
            let queue = self.clone();
            self.spawner.spawn(async move { queue.worker_loop(worker).await });
        }
        info!(workers = self.inner.concurrency, "work queue started");
    }

    /// Move `work` records with a due schedule head into the queue, up to the
    /// free capacity. Returns the number dispatched.
    pub async fn dispatch_ready(&self) -> Result<usize, OrchestratorError> {
        let inner = &self.inner;
        if inner.shared.shutdown.load(Ordering::Acquire) {
            debug!("queue shut down; skipping dispatch");
            return Ok(0);
        }
        if !inner.shared.accepting.load(Ordering::Acquire) {
            debug!("intake stopped; skipping dispatch");
            return Ok(0);
        }
        let active = usize::try_from(inner.counters.active()).unwrap_or(usize::MAX);
        let capacity = inner.concurrency.saturating_sub(active);
        if capacity == 0 {
            debug!(active, "no free capacity");
            return Ok(0);
        }

        let now = inner.clock.now();
        let mut dispatched = 0;
        for task in inner.store.find_ready(now, capacity).await? {
            let Some(&slot) = task.schedule.first() else {
                continue;
            };
            let outcome = inner
                .store
                .update_task(
                    task.id,
                    TaskUpdate::new()
                        .when_status(TaskStatus::Work)
                        .op(UpdateOp::PullSchedule(slot)),
                )
                .await?;
            if !outcome.is_applied() {
                debug!(task_id = %task.id, ?outcome, "slot already taken");
                continue;
            }

            let lease = inner.counters.acquire(task.id, &task.kind);
            inner.shared.push(
                QueuedTask {
                    task_id: task.id,
                    retries: RetryState::default(),
                    lease,
                },
                RequeuePosition::Back,
            );
            dispatched += 1;
        }

        if dispatched > 0 {
            info!(dispatched, "dispatched ready tasks");
        }
        Ok(dispatched)
    }

    /// Stop feeding new tasks; queued and running tasks continue.
    pub fn stop_intake(&self) {
        self.inner.shared.accepting.store(false, Ordering::Release);
        info!("work queue intake stopped");
    }

    /// Resume feeding new tasks.
    pub fn start_intake(&self) {
        self.inner.shared.accepting.store(true, Ordering::Release);
        info!("work queue intake started");
    }

    /// Whether dispatch feeds new tasks.
    pub fn is_accepting(&self) -> bool {
        self.inner.shared.accepting.load(Ordering::Acquire)
    }

    /// Current queue snapshot.
    pub fn status(&self) -> QueueStatus {
        let shared = &self.inner.shared;
        QueueStatus {
            queue_length: shared.queue.lock().len(),
            is_processing: shared.in_flight.load(Ordering::Acquire) > 0,
            accepting_tasks: shared.accepting.load(Ordering::Acquire),
            active_count: self.inner.counters.active(),
            per_type_counts: self.inner.counters.per_kind(),
        }
    }

    /// Resolve once nothing is queued, running or waiting on a backoff.
    pub async fn wait_idle(&self) {
        let shared = &self.inner.shared;
        loop {
            let mut idle = std::pin::pin!(shared.idle.notified());
            idle.as_mut().enable();
            if shared.is_idle() {
                return;
            }
            idle.await;
        }
    }

    /// Stop the workers. Tasks still queued release their leases.
    pub fn shutdown(&self) {
        let shared = &self.inner.shared;
        shared.shutdown.store(true, Ordering::Release);
        let drained: Vec<QueuedTask> = shared.queue.lock().drain(..).collect();
        for item in drained {
            item.lease.release(ExitReason::Shutdown);
        }
        shared.work_ready.notify_waiters();
        shared.notify_if_idle();
        info!("work queue shut down");
    }

    async fn worker_loop(self, worker: usize) {
        let shared = &self.inner.shared;
        debug!(worker, "worker started");
        loop {
            let mut ready = std::pin::pin!(shared.work_ready.notified());
            ready.as_mut().enable();

            if shared.shutdown.load(Ordering::Acquire) {
                break;
            }
            if let Some(item) = shared.pop() {
                self.process(item).await;
                shared.in_flight.fetch_sub(1, Ordering::AcqRel);
                shared.notify_if_idle();
                continue;
            }
            ready.await;
        }
        debug!(worker, "worker stopped");
    }

    async fn process(&self, item: QueuedTask) {
        let QueuedTask {
            task_id,
            retries,
            lease,
        } = item;

        match self.inner.pipeline.run(task_id).await {
            Ok(PipelineOutcome::Settled { .. }) => lease.release(ExitReason::Settled),
            Ok(PipelineOutcome::Depleted) => lease.release(ExitReason::Depleted),
            Ok(PipelineOutcome::Abandoned) => lease.release(ExitReason::Abandoned),
            Ok(PipelineOutcome::NoFunds) => lease.release(ExitReason::NoFunds),
            Ok(PipelineOutcome::Inactive) => lease.release(ExitReason::Inactive),
            Ok(PipelineOutcome::Retry(class)) => self.retry(task_id, retries, lease, class).await,
            Err(err) => {
                error!(task_id = %task_id, "pipeline failed: {err}");
                self.inner
                    .alerts
                    .send(ALERT_SOURCE, &err, self.inner.clock.now());
                lease.release(ExitReason::Fatal);
            }
        }
    }

    async fn retry(
        &self,
        task_id: TaskId,
        mut retries: RetryState,
        lease: ActiveLease,
        class: FailureClass,
    ) {
        let policy = self.inner.retry.policy(class);
        match policy.decide(retries.attempts(class)) {
            RetryDecision::Requeue {
                attempt,
                delay,
                position,
            } => {
                retries.set(class, attempt);
                debug!(task_id = %task_id, ?class, attempt, ?delay, "requeueing");
                let item = QueuedTask {
                    task_id,
                    retries,
                    lease,
                };
                if delay.is_zero() {
                    self.inner.shared.push(item, position);
                } else {
                    self.requeue_after(item, delay, position);
                }
            }
            RetryDecision::Exhausted(exhaustion) => {
                warn!(task_id = %task_id, ?class, "retry ceiling reached");
                if exhaustion == Exhaustion::EscalateSchedule {
                    self.escalate(task_id).await;
                }
                lease.release(ExitReason::RetryExhausted);
            }
        }
    }

    /// Wait out the backoff off the worker, then requeue.
    fn requeue_after(&self, item: QueuedTask, delay: Duration, position: RequeuePosition) {
        let inner = Arc::clone(&self.inner);
        inner.shared.delayed.fetch_add(1, Ordering::AcqRel);
        self.spawner.spawn(async move {
            inner.clock.sleep(delay).await;
            inner.shared.push(item, position);
            inner.shared.delayed.fetch_sub(1, Ordering::AcqRel);
            inner.shared.notify_if_idle();
        });
    }

    /// Append one slot after the last one (or now) so the task gets another
    /// opportunity later.
    async fn escalate(&self, task_id: TaskId) {
        let now = self.inner.clock.now();
        match self.append_escalation_slot(task_id, now).await {
            Ok(Some(slot)) => info!(task_id = %task_id, %slot, "escalation slot appended"),
            Ok(None) => warn!(task_id = %task_id, "escalation not applied"),
            Err(err) => {
                warn!(task_id = %task_id, "escalation failed: {err}");
                self.inner.alerts.send(ALERT_SOURCE, &err, now);
            }
        }
    }

    async fn append_escalation_slot(
        &self,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, OrchestratorError> {
        let store = &self.inner.store;
        let Some(task) = store.get_task(task_id).await? else {
            return Err(OrchestratorError::RecordMissing(task_id));
        };
        let Some(slot) = escalation_slot(&task.schedule, now, self.inner.minimum_interval) else {
            return Ok(None);
        };
        let outcome = store
            .update_task(task_id, TaskUpdate::new().op(UpdateOp::PushSchedule(vec![slot])))
            .await?;
        Ok(outcome.is_applied().then_some(slot))
    }
}
