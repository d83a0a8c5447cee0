//! Tiered retry policy.
//!
//! One [`RetryPolicy`] per failure class. The work queue keeps a separate
//! attempt counter per class in [`RetryState`] and asks the table what to do
//! after each failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failure classes that trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Executor reported the action was not accepted (tier A).
    ActionFailed,
    /// Proxy or account could not be obtained (tier B).
    ResourceUnavailable,
    /// Any other recoverable error (tier C).
    Recoverable,
}

/// Where a retried task re-enters the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeuePosition {
    /// Ahead of everything already queued.
    Front,
    /// Behind everything already queued.
    Back,
}

/// What happens once the ceiling is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exhaustion {
    /// Append a slot at `last + minimum interval` (or now) and release.
    EscalateSchedule,
    /// Release only.
    ReleaseOnly,
}

/// One tier of the retry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub ceiling: u32,
    /// Wait before the task re-enters the queue.
    pub backoff: Duration,
    /// Requeue position.
    pub requeue: RequeuePosition,
    /// Exhaustion behavior.
    pub on_exhaustion: Exhaustion,
}

/// Decision for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back.
    Requeue {
        /// Attempt counter to store for the next run.
        attempt: u32,
        /// Wait before requeueing.
        delay: Duration,
        /// Where to put it.
        position: RequeuePosition,
    },
    /// Ceiling reached.
    Exhausted(Exhaustion),
}

impl RetryPolicy {
    /// Decide after a failure, given retries already spent in this class.
    pub const fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts < self.ceiling {
            RetryDecision::Requeue {
                attempt: attempts + 1,
                delay: self.backoff,
                position: self.requeue,
            }
        } else {
            RetryDecision::Exhausted(self.on_exhaustion)
        }
    }
}

/// Policies for all failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTable {
    /// Tier A.
    pub action_failed: RetryPolicy,
    /// Tier B.
    pub resource_unavailable: RetryPolicy,
    /// Tier C.
    pub recoverable: RetryPolicy,
}

impl Default for RetryTable {
    fn default() -> Self {
        Self {
            action_failed: RetryPolicy {
                ceiling: 3,
                backoff: Duration::ZERO,
                requeue: RequeuePosition::Front,
                on_exhaustion: Exhaustion::EscalateSchedule,
            },
            resource_unavailable: RetryPolicy {
                ceiling: 10,
                backoff: Duration::from_secs(180),
                requeue: RequeuePosition::Front,
                on_exhaustion: Exhaustion::EscalateSchedule,
            },
            recoverable: RetryPolicy {
                ceiling: 10,
                backoff: Duration::ZERO,
                requeue: RequeuePosition::Front,
                on_exhaustion: Exhaustion::ReleaseOnly,
            },
        }
    }
}

impl RetryTable {
    /// Policy for a class.
    pub const fn policy(&self, class: FailureClass) -> &RetryPolicy {
        match class {
            FailureClass::ActionFailed => &self.action_failed,
            FailureClass::ResourceUnavailable => &self.resource_unavailable,
            FailureClass::Recoverable => &self.recoverable,
        }
    }
}

/// Per-class attempt counters carried by a queued task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    /// Tier A retries spent.
    pub action_failed: u32,
    /// Tier B retries spent.
    pub resource_unavailable: u32,
    /// Tier C retries spent.
    pub recoverable: u32,
}

impl RetryState {
    /// Retries spent in `class`.
    pub const fn attempts(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::ActionFailed => self.action_failed,
            FailureClass::ResourceUnavailable => self.resource_unavailable,
            FailureClass::Recoverable => self.recoverable,
        }
    }

    /// Store the attempt counter for `class`.
    pub const fn set(&mut self, class: FailureClass, attempt: u32) {
        match class {
            FailureClass::ActionFailed => self.action_failed = attempt,
            FailureClass::ResourceUnavailable => self.resource_unavailable = attempt,
            FailureClass::Recoverable => self.recoverable = attempt,
        }
    }
}
