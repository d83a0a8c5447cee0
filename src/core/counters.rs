//! Active-task accounting.
//!
//! [`ActiveCounters`] is the single owner of the active count and the per-kind
//! counts. The only way to increment is [`ActiveCounters::acquire`], which
//! returns a move-only [`ActiveLease`]; the only way to decrement is consuming
//! that lease. A lease therefore decrements exactly once, whichever terminal
//! path the pipeline takes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::core::task::TaskId;

/// Why a lease ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// One action settled.
    Settled,
    /// Nothing left to do.
    Depleted,
    /// Record or user missing.
    Abandoned,
    /// Moved to `nofunds`.
    NoFunds,
    /// Record no longer in `work`.
    Inactive,
    /// A retry tier ran out.
    RetryExhausted,
    /// Unrecoverable error; accounted and alerted.
    Fatal,
    /// Queue shut down before the task ran.
    Shutdown,
}

/// Shared counters of tasks owned by the work queue.
#[derive(Debug, Default)]
pub struct ActiveCounters {
    active: AtomicU64,
    per_kind: Mutex<HashMap<String, u64>>,
    generation: AtomicU64,
}

impl ActiveCounters {
    /// Fresh counters at zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count a task as active and hand out its lease.
    pub fn acquire(self: &Arc<Self>, task_id: TaskId, kind: &str) -> ActiveLease {
        // per-kind lock also serializes against reset
        let mut per_kind = self.per_kind.lock();
        *per_kind.entry(kind.to_string()).or_insert(0) += 1;
        self.active.fetch_add(1, Ordering::AcqRel);
        let generation = self.generation.load(Ordering::Acquire);
        drop(per_kind);

        debug!(task_id = %task_id, kind, "active lease acquired");
        ActiveLease {
            counters: Arc::clone(self),
            task_id,
            kind: kind.to_string(),
            generation,
            released: false,
        }
    }

    /// Number of active tasks.
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Acquire)
    }

    /// Active tasks per kind.
    pub fn per_kind(&self) -> HashMap<String, u64> {
        self.per_kind.lock().clone()
    }

    /// Zero all counters. Leases issued before the reset no longer decrement.
    pub fn reset(&self) {
        let mut per_kind = self.per_kind.lock();
        per_kind.clear();
        self.active.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn decrement(&self, kind: &str, generation: u64) {
        let mut per_kind = self.per_kind.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        if let Some(count) = per_kind.get_mut(kind) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                per_kind.remove(kind);
            }
        }
        // saturating: never wraps below zero
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
    }
}

/// Proof that one task is counted as active. Not `Clone`.
#[derive(Debug)]
pub struct ActiveLease {
    counters: Arc<ActiveCounters>,
    task_id: TaskId,
    kind: String,
    generation: u64,
    released: bool,
}

impl ActiveLease {
    /// Task this lease belongs to.
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Task kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// End the lease, decrementing the counters once.
    pub fn release(mut self, reason: ExitReason) {
        self.released = true;
        self.counters.decrement(&self.kind, self.generation);
        debug!(task_id = %self.task_id, reason = ?reason, "active lease released");
    }
}

impl Drop for ActiveLease {
    fn drop(&mut self) {
        if !self.released {
            error!(
                task_id = %self.task_id,
                "active lease dropped without release; accounting as fatal exit"
            );
            self.counters.decrement(&self.kind, self.generation);
        }
    }
}
