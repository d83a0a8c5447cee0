//! Shared fakes and harness for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use uuid::Uuid;

use likes_orchestrator::builders::OrchestratorBuilder;
use likes_orchestrator::config::OrchestratorConfig;
use likes_orchestrator::core::{
    Account, ActionError, ActionExecutor, ActionRequest, Alert, AlertHandle, Proxy, ReviewCounter,
    ReviewCounts, ReviewProgress, ReviewTarget, SharedMemorySink, TaskId, TaskRecord, TaskStatus,
    UserAccount, UserId,
};
use likes_orchestrator::infra::{InMemoryResourcePool, InMemoryTaskStore};
use likes_orchestrator::runtime::{Orchestrator, TokioSpawner};
use likes_orchestrator::util::ManualClock;

/// Default minimum slot spacing.
pub fn min_gap() -> TimeDelta {
    TimeDelta::minutes(5)
}

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

// ============================================================================
// FAKE COLLABORATORS
// ============================================================================

/// Executor that replays a script of results, then succeeds.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<bool, ActionError>>>,
    requests: Mutex<Vec<ActionRequest>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    hold: AtomicBool,
    entered: Notify,
    resume: Notify,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<bool, ActionError>) {
        self.script.lock().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().clone()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Park the next call inside `perform` until [`Self::resume`].
    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn resume(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.resume.notify_one();
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn perform(&self, request: &ActionRequest) -> Result<bool, ActionError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.resume.notified().await;
        }
        tokio::task::yield_now().await;
        let result = self.script.lock().pop_front().unwrap_or(Ok(true));
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Review counter returning fixed counts, optionally failing for some reviews.
#[derive(Default)]
pub struct FixedCounter {
    counts: Mutex<HashMap<String, ReviewCounts>>,
    failing: Mutex<HashSet<String>>,
}

impl FixedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, review_id: &str, likes: u64, dislikes: u64) {
        self.counts
            .lock()
            .insert(review_id.to_string(), ReviewCounts { likes, dislikes });
    }

    pub fn fail(&self, review_id: &str) {
        self.failing.lock().insert(review_id.to_string());
    }
}

#[async_trait]
impl ReviewCounter for FixedCounter {
    async fn review_counts(
        &self,
        _article: &str,
        review_id: &str,
    ) -> Result<ReviewCounts, ActionError> {
        if self.failing.lock().contains(review_id) {
            return Err(ActionError::Transient(format!("counts unavailable for {review_id}")));
        }
        Ok(self.counts.lock().get(review_id).copied().unwrap_or_default())
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct Harness {
    pub store: Arc<InMemoryTaskStore>,
    pub pool: Arc<InMemoryResourcePool>,
    pub executor: Arc<ScriptedExecutor>,
    pub counter: Arc<FixedCounter>,
    pub clock: Arc<ManualClock>,
    pub alerts: SharedMemorySink,
    pub orchestrator: Orchestrator<TokioSpawner>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let pool = Arc::new(InMemoryResourcePool::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let counter = Arc::new(FixedCounter::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let alerts = SharedMemorySink::new(1024);

        let orchestrator = OrchestratorBuilder::new(config, TokioSpawner::current())
            .store(store.clone())
            .resources(pool.clone())
            .executor(executor.clone())
            .review_counter(counter.clone())
            .clock(clock.clone())
            .alerts(AlertHandle::new(alerts.clone()))
            .build()
            .unwrap();

        Self {
            store,
            pool,
            executor,
            counter,
            clock,
            alerts,
            orchestrator,
        }
    }

    /// Add `n` proxies and `n` accounts numbered from 100.
    pub fn seed_resources(&self, n: usize) {
        for i in 0..n {
            self.pool.add_proxy(Proxy(format!("10.0.0.{i}:3128")));
            self.add_account(&format!("{}", 100 + i));
        }
    }

    pub fn add_account(&self, number: &str) {
        self.pool.add_account(Account {
            phone_number: number.to_string(),
            session: format!("session-{number}"),
        });
    }

    pub fn user(&self, balance: i64) -> UserId {
        let id = Uuid::new_v4();
        self.store.put_user(UserAccount {
            id,
            balance: Decimal::from(balance),
        });
        id
    }

    pub fn task(&self, id: TaskId) -> TaskRecord {
        self.store.task(id).unwrap()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.alerts()
    }

    pub fn alerted(&self, needle: &str) -> bool {
        self.alerts().iter().any(|a| a.message.contains(needle))
    }

    /// Dispatch due slots, run workers until idle.
    pub async fn dispatch_and_drain(&self) -> usize {
        let dispatched = self.orchestrator.queue().dispatch_ready().await.unwrap();
        self.orchestrator.start();
        self.drain().await;
        dispatched
    }

    pub async fn drain(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.orchestrator.queue().wait_idle())
            .await
            .expect("queue did not become idle");
    }

    pub fn active(&self) -> u64 {
        self.orchestrator.counters().active()
    }
}

// ============================================================================
// RECORD BUILDERS
// ============================================================================

/// `work` record with zeroed progress, as intake leaves it.
pub fn work_task(user: UserId, reviews: Vec<ReviewTarget>, schedule: Vec<DateTime<Utc>>) -> TaskRecord {
    let mut task = TaskRecord::new(user, "article-1", reviews);
    task.status = TaskStatus::Work;
    task.result_reviews = task
        .reviews
        .iter()
        .map(|r| ReviewProgress {
            review_id: r.review_id.clone(),
            likes_made: 0,
            dislikes_made: 0,
        })
        .collect();
    task.schedule = schedule;
    task
}

/// `work` record whose recorded progress already meets the target.
pub fn exhausted_task(user: UserId, review_id: &str, likes: u32, baseline: u64) -> TaskRecord {
    let mut task = work_task(user, vec![ReviewTarget::new(review_id, likes, 0)], vec![]);
    task.result_reviews[0].likes_made = likes;
    task.total_likes_made = likes;
    task.total_amount_made = likes;
    task.initial_reviews = vec![likes_orchestrator::core::ReviewBaseline {
        review_id: review_id.to_string(),
        initial_likes: baseline,
        initial_dislikes: 0,
    }];
    task
}
