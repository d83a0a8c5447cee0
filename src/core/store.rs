//! Persistence abstraction for task records and the billing ledger.
//!
//! Every mutation of a task record goes through [`TaskStore::update_task`] with
//! a [`TaskUpdate`]: a list of field operations applied to one document
//! atomically, optionally guarded by a status precondition. Backends apply the
//! update with [`TaskUpdate::apply_to`] on a working copy and commit only when
//! the outcome is [`UpdateOutcome::Applied`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::StoreError;
use crate::core::task::{
    AccountsUsed, ActionKind, BalanceHistoryEntry, DebitEntry, ReviewBaseline, ReviewProgress,
    TaskId, TaskRecord, TaskStatus, UserAccount, UserId,
};

/// One field-level operation inside a [`TaskUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOp {
    /// Change status; validated against the lifecycle transition table.
    SetStatus(TaskStatus),
    /// Set or clear the completion time.
    SetEndedDate(Option<DateTime<Utc>>),
    /// Replace the whole schedule.
    SetSchedule(Vec<DateTime<Utc>>),
    /// Append slots to the schedule.
    PushSchedule(Vec<DateTime<Utc>>),
    /// Remove one slot. Fails the precondition when the slot is absent.
    PullSchedule(DateTime<Utc>),
    /// Increment one review's progress and the aggregate counters by one.
    IncrementProgress {
        /// Review matched by id.
        review_id: String,
        /// Which counter to bump.
        action: ActionKind,
    },
    /// Record a consumed phone number on a review.
    PushAccountUsed {
        /// Review matched by id.
        review_id: String,
        /// Phone number used.
        number: String,
    },
    /// Replace the reuse-guard log.
    SetAccountsUsed(Vec<AccountsUsed>),
    /// Persist baseline counts.
    SetInitialReviews(Vec<ReviewBaseline>),
    /// Overwrite per-review progress and recompute aggregates from it.
    OverwriteProgress(Vec<ReviewProgress>),
    /// Zero all counters and write empty per-review skeletons.
    ResetProgress,
    /// Increment the reconciliation retry counter.
    IncrementRetryAmount,
    /// Set the reconciliation retry counter.
    SetRetryAmount(u32),
    /// Record the last reconciliation pick.
    SetLastRetryDate(DateTime<Utc>),
}

/// Atomic document-level update of one task record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    /// Required current status; `None` applies unconditionally.
    pub when_status: Option<TaskStatus>,
    /// Operations, applied in order.
    pub ops: Vec<UpdateOp>,
}

/// Result of [`TaskStore::update_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// All operations were committed.
    Applied,
    /// No record with that id.
    NotFound,
    /// Status precondition or slot removal did not match; nothing committed.
    PreconditionFailed,
    /// A `SetStatus` op was rejected by the transition table; nothing committed.
    InvalidTransition {
        /// Status at the time of the update.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
}

impl UpdateOutcome {
    /// Whether the update was committed.
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl TaskUpdate {
    /// Empty, unconditional update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the record to be in `status`.
    #[must_use]
    pub const fn when_status(mut self, status: TaskStatus) -> Self {
        self.when_status = Some(status);
        self
    }

    /// Append an operation.
    #[must_use]
    pub fn op(mut self, op: UpdateOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Apply to `record` in place.
    ///
    /// On any outcome other than [`UpdateOutcome::Applied`] the record may be
    /// partially modified; callers must apply to a copy and discard it.
    pub fn apply_to(&self, record: &mut TaskRecord) -> UpdateOutcome {
        if let Some(expected) = self.when_status {
            if record.status != expected {
                return UpdateOutcome::PreconditionFailed;
            }
        }

        for op in &self.ops {
            match op {
                UpdateOp::SetStatus(to) => {
                    if !record.status.can_transition_to(*to) {
                        return UpdateOutcome::InvalidTransition {
                            from: record.status,
                            to: *to,
                        };
                    }
                    record.status = *to;
                }
                UpdateOp::SetEndedDate(date) => record.ended_date = *date,
                UpdateOp::SetSchedule(slots) => record.schedule.clone_from(slots),
                UpdateOp::PushSchedule(slots) => record.schedule.extend_from_slice(slots),
                UpdateOp::PullSchedule(slot) => {
                    let Some(pos) = record.schedule.iter().position(|s| s == slot) else {
                        return UpdateOutcome::PreconditionFailed;
                    };
                    record.schedule.remove(pos);
                }
                UpdateOp::IncrementProgress { review_id, action } => {
                    increment_progress(record, review_id, *action);
                }
                UpdateOp::PushAccountUsed { review_id, number } => {
                    match record
                        .accounts_used
                        .iter_mut()
                        .find(|a| &a.review_id == review_id)
                    {
                        Some(entry) => entry.numbers_used.push(number.clone()),
                        None => record.accounts_used.push(AccountsUsed {
                            review_id: review_id.clone(),
                            numbers_used: vec![number.clone()],
                        }),
                    }
                }
                UpdateOp::SetAccountsUsed(used) => record.accounts_used.clone_from(used),
                UpdateOp::SetInitialReviews(baselines) => {
                    record.initial_reviews.clone_from(baselines);
                }
                UpdateOp::OverwriteProgress(progress) => {
                    record.result_reviews.clone_from(progress);
                    record.total_likes_made = progress.iter().map(|p| p.likes_made).sum();
                    record.total_dislikes_made = progress.iter().map(|p| p.dislikes_made).sum();
                    record.total_amount_made =
                        record.total_likes_made + record.total_dislikes_made;
                }
                UpdateOp::ResetProgress => reset_progress(record),
                UpdateOp::IncrementRetryAmount => record.retry_amount += 1,
                UpdateOp::SetRetryAmount(n) => record.retry_amount = *n,
                UpdateOp::SetLastRetryDate(date) => record.last_retry_date = Some(*date),
            }
        }

        UpdateOutcome::Applied
    }
}

fn increment_progress(record: &mut TaskRecord, review_id: &str, action: ActionKind) {
    let idx = if let Some(i) = record
        .result_reviews
        .iter()
        .position(|p| p.review_id == review_id)
    {
        i
    } else {
        record.result_reviews.push(ReviewProgress {
            review_id: review_id.to_string(),
            likes_made: 0,
            dislikes_made: 0,
        });
        record.result_reviews.len() - 1
    };

    let entry = &mut record.result_reviews[idx];
    match action {
        ActionKind::Like => {
            entry.likes_made += 1;
            record.total_likes_made += 1;
        }
        ActionKind::Dislike => {
            entry.dislikes_made += 1;
            record.total_dislikes_made += 1;
        }
    }
    record.total_amount_made += 1;
}

fn reset_progress(record: &mut TaskRecord) {
    record.total_amount_made = 0;
    record.total_likes_made = 0;
    record.total_dislikes_made = 0;
    record.retry_amount = 0;
    record.last_retry_date = None;
    record.result_reviews = record
        .reviews
        .iter()
        .map(|r| ReviewProgress {
            review_id: r.review_id.clone(),
            likes_made: 0,
            dislikes_made: 0,
        })
        .collect();
    record.initial_reviews = record
        .reviews
        .iter()
        .map(|r| ReviewBaseline {
            review_id: r.review_id.clone(),
            initial_likes: 0,
            initial_dislikes: 0,
        })
        .collect();
}

/// Document store holding task records, users and the billing ledger.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Insert a new record.
    async fn insert_task(&self, task: TaskRecord) -> Result<(), StoreError>;

    /// Point lookup by id.
    async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError>;

    /// Point lookup of a user.
    async fn get_user(&self, id: UserId) -> Result<Option<UserAccount>, StoreError>;

    /// All records in `status`.
    async fn find_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, StoreError>;

    /// All records targeting `review_id`.
    async fn find_by_review(&self, review_id: &str) -> Result<Vec<TaskRecord>, StoreError>;

    /// `work` records whose schedule head is at or before `now`, earliest head
    /// first, at most `limit`.
    async fn find_ready(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Apply an atomic update to one record.
    async fn update_task(&self, id: TaskId, update: TaskUpdate)
        -> Result<UpdateOutcome, StoreError>;

    /// Write one debit request.
    async fn insert_debit(&self, entry: DebitEntry) -> Result<(), StoreError>;

    /// Write one balance-history line.
    async fn insert_balance_history(&self, entry: BalanceHistoryEntry) -> Result<(), StoreError>;
}
