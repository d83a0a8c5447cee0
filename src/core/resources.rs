//! Proxy and account pool abstraction with bounded acquisition.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{OrchestratorError, ResourceKind, StoreError};
use crate::core::task::{ActionKind, TaskId};
use crate::util::clock::Clock;

/// Outbound proxy address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proxy(pub String);

impl std::fmt::Display for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Disposable account checked out for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Phone number the account is registered with.
    pub phone_number: String,
    /// Opaque session material for the executor.
    pub session: String,
}

/// Parameters of an account checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRequest<'a> {
    /// Task asking for the account.
    pub task_id: TaskId,
    /// Review the account will act on.
    pub review_id: &'a str,
    /// Action it will perform.
    pub action: ActionKind,
    /// Numbers that already acted on this review and must not be handed out.
    pub exclude: &'a [String],
}

/// Result of probing a proxy before it goes back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyHealth {
    /// Proxy answered; carries the exit address it reported.
    Healthy {
        /// Last observed exit IP.
        exit_address: String,
    },
    /// Proxy did not answer.
    Unhealthy,
}

/// Supplies proxies and accounts. One attempt per call; `Ok(None)` means
/// nothing is free right now.
#[async_trait]
pub trait ResourcePool: Send + Sync + 'static {
    /// Try to check out a free proxy.
    async fn try_acquire_proxy(&self) -> Result<Option<Proxy>, StoreError>;

    /// Try to check out a free account.
    async fn try_acquire_account(
        &self,
        request: AccountRequest<'_>,
    ) -> Result<Option<Account>, StoreError>;

    /// Probe a proxy's health.
    async fn probe_proxy(&self, proxy: &Proxy) -> ProxyHealth;

    /// Return a proxy. Healthy proxies become free again with their exit
    /// address recorded; unhealthy ones are withheld.
    async fn release_proxy(&self, proxy: Proxy, health: ProxyHealth);

    /// Mark a phone number free.
    async fn release_phone_number(&self, phone_number: &str);
}

/// Attempt limit and pause between acquisition attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireLimits {
    /// Maximum attempts before giving up.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

/// Call `attempt` until it yields a resource or `limits.attempts` is reached.
///
/// Exhaustion is reported as [`OrchestratorError::ResourceUnavailable`];
/// backend errors propagate immediately.
pub async fn acquire_bounded<T, F, Fut>(
    clock: &dyn Clock,
    limits: AcquireLimits,
    kind: ResourceKind,
    mut attempt: F,
) -> Result<T, OrchestratorError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>, StoreError>> + Send,
{
    for n in 1..=limits.attempts {
        if let Some(resource) = attempt().await? {
            return Ok(resource);
        }
        debug!(resource = %kind, attempt = n, "no free resource");
        if n < limits.attempts {
            clock.sleep(limits.delay).await;
        }
    }
    Err(OrchestratorError::ResourceUnavailable(kind))
}
