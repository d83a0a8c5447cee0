//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use crate::core::Spawn;

/// Tokio-based spawner that runs worker loops and delayed requeues on a tokio
/// runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Create a `TokioSpawner` from a tokio runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Spawner bound to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    /// Like [`TokioSpawner::current`], but reports a missing runtime instead
    /// of panicking.
    pub fn try_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        tokio::runtime::Handle::try_current().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // keep the caller's span so worker logs stay attributable
        self.handle.spawn(fut.in_current_span());
    }
}
