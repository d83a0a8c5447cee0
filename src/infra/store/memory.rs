//! In-memory task store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::core::error::StoreError;
use crate::core::store::{TaskStore, TaskUpdate, UpdateOutcome};
use crate::core::task::{
    BalanceHistoryEntry, DebitEntry, TaskId, TaskRecord, TaskStatus, UserAccount, UserId,
};

#[derive(Default)]
struct State {
    tasks: HashMap<TaskId, TaskRecord>,
    users: HashMap<UserId, UserAccount>,
    debits: Vec<DebitEntry>,
    history: Vec<BalanceHistoryEntry>,
}

/// Document store kept in process memory for development and testing.
///
/// Updates run against a copy of the record under one lock and are committed
/// only when fully applied, so each [`TaskUpdate`] is atomic.
#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<State>,
    fail_ledger: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn put_user(&self, user: UserAccount) {
        self.state.lock().users.insert(user.id, user);
    }

    /// Change a user's balance. Returns `false` if the user is unknown.
    pub fn set_balance(&self, user: UserId, balance: Decimal) -> bool {
        self.state
            .lock()
            .users
            .get_mut(&user)
            .map(|u| u.balance = balance)
            .is_some()
    }

    /// Replace a record wholesale, bypassing update rules.
    pub fn put_task(&self, task: TaskRecord) {
        self.state.lock().tasks.insert(task.id, task);
    }

    /// Snapshot of a record.
    pub fn task(&self, id: TaskId) -> Option<TaskRecord> {
        self.state.lock().tasks.get(&id).cloned()
    }

    /// Remove a record.
    pub fn remove_task(&self, id: TaskId) -> Option<TaskRecord> {
        self.state.lock().tasks.remove(&id)
    }

    /// Debit entries written so far.
    pub fn debits(&self) -> Vec<DebitEntry> {
        self.state.lock().debits.clone()
    }

    /// Balance-history entries written so far.
    pub fn balance_history(&self) -> Vec<BalanceHistoryEntry> {
        self.state.lock().history.clone()
    }

    /// Make ledger writes fail with a backend error.
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger.store(fail, Ordering::Release);
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn check_ledger(&self) -> Result<(), StoreError> {
        self.check_available()?;
        if self.fail_ledger.load(Ordering::Acquire) {
            return Err(StoreError::Backend("ledger write rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert_task(&self, task: TaskRecord) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::Backend(format!("duplicate task id {}", task.id)));
        }
        state.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        self.check_available()?;
        Ok(self.task(id))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn find_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_review(&self, review_id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .tasks
            .values()
            .filter(|t| t.reviews.iter().any(|r| r.review_id == review_id))
            .cloned()
            .collect())
    }

    async fn find_ready(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        self.check_available()?;
        let state = self.state.lock();
        let mut ready: Vec<(DateTime<Utc>, &TaskRecord)> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Work)
            .filter_map(|t| t.schedule.first().map(|head| (*head, t)))
            .filter(|(head, _)| *head <= now)
            .collect();
        ready.sort_by_key(|(head, _)| *head);
        Ok(ready
            .into_iter()
            .take(limit)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn update_task(
        &self,
        id: TaskId,
        update: TaskUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let Some(current) = state.tasks.get(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        let mut working = current.clone();
        let outcome = update.apply_to(&mut working);
        if outcome.is_applied() {
            state.tasks.insert(id, working);
        }
        Ok(outcome)
    }

    async fn insert_debit(&self, entry: DebitEntry) -> Result<(), StoreError> {
        self.check_ledger()?;
        self.state.lock().debits.push(entry);
        Ok(())
    }

    async fn insert_balance_history(&self, entry: BalanceHistoryEntry) -> Result<(), StoreError> {
        self.check_ledger()?;
        self.state.lock().history.push(entry);
        Ok(())
    }
}
