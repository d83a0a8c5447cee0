//! Core orchestration: task model, pipeline, work queue and periodic services.

pub mod alert;
pub mod balance;
pub mod counters;
pub mod error;
pub mod executor;
pub mod intake;
pub mod maintenance;
pub mod pipeline;
pub mod reconcile;
pub mod recovery;
pub mod resources;
pub mod retry;
pub mod schedule;
pub mod store;
pub mod task;
pub mod work_queue;

pub use alert::{
    build_alert, Alert, AlertHandle, AlertSink, InMemoryAlertSink, SharedMemorySink,
    TracingAlertSink,
};
pub use balance::BalanceGate;
pub use counters::{ActiveCounters, ActiveLease, ExitReason};
pub use error::{ActionError, AppResult, OrchestratorError, ResourceKind, StoreError};
pub use executor::{ActionExecutor, ActionRequest, ReviewCounter};
pub use intake::Intake;
pub use maintenance::{MaintenanceJob, MaintenanceScheduler};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use reconcile::{ReconcileReport, ReconcileSettings, ReconciliationService};
pub use recovery::IncompleteRecovery;
pub use resources::{
    acquire_bounded, Account, AccountRequest, AcquireLimits, Proxy, ProxyHealth, ResourcePool,
};
pub use retry::{
    Exhaustion, FailureClass, RequeuePosition, RetryDecision, RetryPolicy, RetryState, RetryTable,
};
pub use store::{TaskStore, TaskUpdate, UpdateOp, UpdateOutcome};
pub use task::{
    AccountsUsed, ActionKind, BalanceHistoryEntry, BalanceOperation, DebitEntry, DebitStatus,
    ReviewBaseline, ReviewCounts, ReviewProgress, ReviewTarget, TaskId, TaskRecord, TaskStatus,
    UserAccount, UserId, DEFAULT_TASK_KIND,
};
pub use work_queue::{QueueStatus, Spawn, WorkQueue};
