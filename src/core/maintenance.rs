//! Periodic maintenance jobs driven by an explicit scheduler loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::clock::to_delta;

/// Periodic job run by the orchestrator loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceJob {
    /// Promote due `created` records.
    Intake,
    /// Feed ready slots into the work queue.
    Dispatch,
    /// Log queue status.
    QueueReport,
    /// Reconcile against external counts.
    Reconcile,
    /// Repair completed-but-short records.
    IncompleteRecovery,
    /// Resume funded `nofunds` records.
    NoFundsRecovery,
}

impl MaintenanceJob {
    /// Stable name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Dispatch => "dispatch",
            Self::QueueReport => "queue_report",
            Self::Reconcile => "reconcile",
            Self::IncompleteRecovery => "incomplete_recovery",
            Self::NoFundsRecovery => "nofunds_recovery",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    job: MaintenanceJob,
    period: Duration,
    next_due: DateTime<Utc>,
}

/// Tracks when each job is next due. Each job first fires one period after
/// the scheduler starts.
#[derive(Debug, Clone)]
pub struct MaintenanceScheduler {
    entries: Vec<Entry>,
}

impl MaintenanceScheduler {
    /// Create a scheduler from `(job, period)` pairs.
    pub fn new(
        periods: impl IntoIterator<Item = (MaintenanceJob, Duration)>,
        start: DateTime<Utc>,
    ) -> Self {
        let entries = periods
            .into_iter()
            .map(|(job, period)| Entry {
                job,
                period,
                next_due: start + to_delta(period),
            })
            .collect();
        Self { entries }
    }

    /// Jobs due at `now`, in registration order. Each returned job is
    /// rescheduled one period after `now`.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<MaintenanceJob> {
        self.entries
            .iter_mut()
            .filter(|e| e.next_due <= now)
            .map(|e| {
                e.next_due = now + to_delta(e.period);
                e.job
            })
            .collect()
    }

    /// Earliest next due time.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|e| e.next_due).min()
    }
}
