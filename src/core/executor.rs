//! External action and counting traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::ActionError;
use crate::core::resources::{Account, Proxy};
use crate::core::task::{ActionKind, ReviewCounts};

/// Everything needed to apply one action against the external platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Phone number identifying the account.
    pub phone_number: String,
    /// Outbound proxy to route through.
    pub proxy: Proxy,
    /// Target item.
    pub article: String,
    /// Like or dislike.
    pub action: ActionKind,
    /// Checked-out account.
    pub account: Account,
    /// Target review.
    pub review_id: String,
}

/// Performs a single like/dislike on the external platform.
///
/// `Ok(false)` means the platform rejected the action (retry tier A).
/// `Err(ActionError::ResourceUnavailable(_))` signals that a resource ran out
/// mid-action and is handled like an acquisition failure.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use likes_orchestrator::core::{ActionError, ActionExecutor, ActionRequest};
///
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl ActionExecutor for AlwaysOk {
///     async fn perform(&self, _req: &ActionRequest) -> Result<bool, ActionError> {
///         Ok(true)
///     }
/// }
/// ```
#[async_trait]
pub trait ActionExecutor: Send + Sync + 'static {
    /// Apply the action and report whether the platform accepted it.
    async fn perform(&self, request: &ActionRequest) -> Result<bool, ActionError>;
}

/// Reads current like/dislike counts of a review on the external platform.
#[async_trait]
pub trait ReviewCounter: Send + Sync + 'static {
    /// Current counts for `review_id` on `article`.
    async fn review_counts(&self, article: &str, review_id: &str)
        -> Result<ReviewCounts, ActionError>;
}
