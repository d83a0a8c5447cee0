//! Persisted task records and the lifecycle state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique task identifier.
pub type TaskId = Uuid;

/// Unique user identifier.
pub type UserId = Uuid;

/// Default task kind, used for per-kind counters and ledger entries.
pub const DEFAULT_TASK_KIND: &str = "likes";

/// Lifecycle status of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created externally, not yet promoted by intake.
    Created,
    /// Active; the work queue may consume its schedule.
    Work,
    /// Suspended because the owner's balance does not cover the remaining cost.
    NoFunds,
    /// All actions made.
    Completed,
}

impl TaskStatus {
    /// Check if this status allows transitioning to `target`.
    pub const fn can_transition_to(self, target: Self) -> bool {
        use TaskStatus::{Completed, Created, NoFunds, Work};

        matches!(
            (self, target),
            // Intake
            (Created, Work) |
            // Balance gate and its recovery
            (Work, NoFunds) | (NoFunds, Work) |
            // Pipeline completion or reconciliation
            (Work, Completed) |
            // Incomplete-task recovery
            (Completed, Work)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Work => "work",
            Self::NoFunds => "nofunds",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Kind of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Positive vote.
    Like,
    /// Negative vote.
    Dislike,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Like => write!(f, "like"),
            Self::Dislike => write!(f, "dislike"),
        }
    }
}

/// Desired outcome for one review. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTarget {
    /// Review identifier on the external platform.
    pub review_id: String,
    /// Likes to apply.
    pub desired_likes: u32,
    /// Dislikes to apply.
    pub desired_dislikes: u32,
}

impl ReviewTarget {
    /// Create a target.
    pub fn new(review_id: impl Into<String>, desired_likes: u32, desired_dislikes: u32) -> Self {
        Self {
            review_id: review_id.into(),
            desired_likes,
            desired_dislikes,
        }
    }
}

/// Actions made so far on one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewProgress {
    /// Review identifier.
    pub review_id: String,
    /// Likes made by this task.
    pub likes_made: u32,
    /// Dislikes made by this task.
    pub dislikes_made: u32,
}

/// External counts captured before the first action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewBaseline {
    /// Review identifier.
    pub review_id: String,
    /// Likes present before this task acted.
    pub initial_likes: u64,
    /// Dislikes present before this task acted.
    pub initial_dislikes: u64,
}

/// Externally observed like/dislike counts of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReviewCounts {
    /// Current likes.
    pub likes: u64,
    /// Current dislikes.
    pub dislikes: u64,
}

/// Accounts consumed on one review (resource-reuse guard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsUsed {
    /// Review identifier.
    pub review_id: String,
    /// Phone numbers already used on this review.
    pub numbers_used: Vec<String>,
}

/// A persisted unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier.
    pub id: TaskId,
    /// Owning user.
    pub user: UserId,
    /// Target item on the external platform.
    pub article: String,
    /// Task kind (per-kind counters, ledger basis).
    pub kind: String,
    /// Desired outcome per review, in processing order.
    pub reviews: Vec<ReviewTarget>,
    /// Progress per review, keyed 1:1 with `reviews`.
    pub result_reviews: Vec<ReviewProgress>,
    /// Baseline per review, keyed 1:1 with `reviews`.
    pub initial_reviews: Vec<ReviewBaseline>,
    /// Total actions requested.
    pub total: u32,
    /// Total actions made (likes + dislikes).
    pub total_amount_made: u32,
    /// Likes made.
    pub total_likes_made: u32,
    /// Dislikes made.
    pub total_dislikes_made: u32,
    /// Consumed accounts per review.
    pub accounts_used: Vec<AccountsUsed>,
    /// Remaining attempt opportunities, strictly increasing.
    pub schedule: Vec<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Reconciliation retry counter.
    pub retry_amount: u32,
    /// Last time reconciliation picked this record.
    pub last_retry_date: Option<DateTime<Utc>>,
    /// Activation time; intake waits for it.
    pub date_start: Option<DateTime<Utc>>,
    /// Optional end of the spreading window.
    pub date_end: Option<DateTime<Utc>>,
    /// Completion time.
    pub ended_date: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Create a record in `created` status. `total` is the sum of desired actions.
    pub fn new(user: UserId, article: impl Into<String>, reviews: Vec<ReviewTarget>) -> Self {
        let total = reviews
            .iter()
            .map(|r| r.desired_likes.saturating_add(r.desired_dislikes))
            .fold(0u32, u32::saturating_add);
        Self {
            id: Uuid::new_v4(),
            user,
            article: article.into(),
            kind: DEFAULT_TASK_KIND.to_string(),
            reviews,
            result_reviews: Vec::new(),
            initial_reviews: Vec::new(),
            total,
            total_amount_made: 0,
            total_likes_made: 0,
            total_dislikes_made: 0,
            accounts_used: Vec::new(),
            schedule: Vec::new(),
            status: TaskStatus::Created,
            retry_amount: 0,
            last_retry_date: None,
            date_start: None,
            date_end: None,
            ended_date: None,
        }
    }

    /// Set the activation window.
    #[must_use]
    pub const fn with_window(
        mut self,
        date_start: Option<DateTime<Utc>>,
        date_end: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_start = date_start;
        self.date_end = date_end;
        self
    }

    /// Actions still to be made; zero once the target is met or exceeded.
    pub const fn remaining_actions(&self) -> u32 {
        self.total.saturating_sub(self.total_amount_made)
    }

    /// Whether the aggregate counters are consistent.
    pub const fn counters_consistent(&self) -> bool {
        self.total_amount_made == self.total_likes_made + self.total_dislikes_made
    }

    /// Progress entry for a review.
    pub fn progress_for(&self, review_id: &str) -> Option<&ReviewProgress> {
        self.result_reviews.iter().find(|r| r.review_id == review_id)
    }

    /// Baseline entry for a review.
    pub fn baseline_for(&self, review_id: &str) -> Option<&ReviewBaseline> {
        self.initial_reviews.iter().find(|r| r.review_id == review_id)
    }

    /// First review (in stored order) still needing an action, and which one.
    ///
    /// Likes are made before dislikes on the same review. Reviews without a
    /// progress entry count as untouched.
    pub fn next_action(&self) -> Option<(&ReviewTarget, ActionKind)> {
        self.reviews.iter().find_map(|review| {
            let (likes, dislikes) = self
                .progress_for(&review.review_id)
                .map_or((0, 0), |p| (p.likes_made, p.dislikes_made));
            if likes < review.desired_likes {
                Some((review, ActionKind::Like))
            } else if dislikes < review.desired_dislikes {
                Some((review, ActionKind::Dislike))
            } else {
                None
            }
        })
    }

    /// Numbers already used on a review.
    pub fn numbers_used_on(&self, review_id: &str) -> &[String] {
        self.accounts_used
            .iter()
            .find(|a| a.review_id == review_id)
            .map_or(&[][..], |a| a.numbers_used.as_slice())
    }
}

/// Billing view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// User identifier.
    pub id: UserId,
    /// Spendable balance.
    pub balance: Decimal,
}

/// Status of a debit request in the billing ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebitStatus {
    /// Awaiting the billing service.
    Created,
}

/// One debit request written per successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Charged user.
    pub user: UserId,
    /// Task kind.
    pub kind: String,
    /// Task that produced the charge.
    pub task_id: TaskId,
    /// Amount.
    pub sum: Decimal,
    /// Ledger status.
    pub status: DebitStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Direction of a balance-history operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceOperation {
    /// Money spent.
    Expense,
}

/// User-facing balance history line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceHistoryEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// User.
    pub user: UserId,
    /// Amount.
    pub sum: Decimal,
    /// Direction.
    pub operation: BalanceOperation,
    /// Human-readable basis, e.g. `likes <task id>`.
    pub basis: String,
    /// Task kind.
    pub kind: String,
    /// Operation time.
    pub date: DateTime<Utc>,
}
