//! Error types for orchestration operations.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::task::{TaskId, TaskStatus, UserId};

/// Which pooled resource could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Outbound proxy.
    Proxy,
    /// Disposable account (phone number + session).
    Account,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proxy => write!(f, "proxy"),
            Self::Account => write!(f, "account"),
        }
    }
}

/// Errors produced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure; the operation may succeed if retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by external collaborators (action executor, review counter).
#[derive(Debug, Error)]
pub enum ActionError {
    /// A pooled resource ran out mid-action.
    #[error("no available {0}")]
    ResourceUnavailable(ResourceKind),
    /// Miscellaneous recoverable failure.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Errors produced by orchestrator components.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Resource acquisition exhausted its bounded attempts.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(ResourceKind),
    /// The external action reported failure.
    #[error("action failed for task {0}")]
    ActionFailed(TaskId),
    /// Task record was not found.
    #[error("task record {0} not found")]
    RecordMissing(TaskId),
    /// Owning user was not found.
    #[error("user {0} not found")]
    UserMissing(UserId),
    /// Balance does not cover the required cost.
    #[error("insufficient balance for user {user}: required {required}, available {available}")]
    InsufficientBalance {
        /// User whose balance was checked.
        user: UserId,
        /// Cost that had to be covered.
        required: Decimal,
        /// Balance at check time.
        available: Decimal,
    },
    /// Debit ledger or balance history could not be written after a successful action.
    #[error("ledger write failed for task {task}: {reason}")]
    LedgerWriteFailure {
        /// Task whose settle failed.
        task: TaskId,
        /// Underlying cause.
        reason: String,
    },
    /// External counts could not be fetched during reconciliation.
    #[error("reconciliation query failed for task {task}, review {review_id}: {reason}")]
    ReconciliationQueryFailure {
        /// Task under reconciliation.
        task: TaskId,
        /// Review whose counts were requested.
        review_id: String,
        /// Underlying cause.
        reason: String,
    },
    /// Baseline counts could not be captured before the first action.
    #[error("baseline capture failed for task {task}: {reason}")]
    BaselineCapture {
        /// Task whose baseline failed.
        task: TaskId,
        /// Underlying cause.
        reason: String,
    },
    /// A status change that the lifecycle does not allow.
    #[error("invalid transition for task {task}: {from} -> {to}")]
    InvalidTransition {
        /// Task whose status change was rejected.
        task: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration failure.
    #[error("config invalid: {0}")]
    Config(String),
}

impl OrchestratorError {
    /// Whether the error is a transient persistence failure (retry tier C).
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable(_)))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
