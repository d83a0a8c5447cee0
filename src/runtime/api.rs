//! In-process control surface and its response models.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{ActiveCounters, QueueStatus, Spawn, WorkQueue};

/// Acknowledgement of a control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Human-readable result.
    pub message: String,
}

impl ControlResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Whether dispatch feeds new tasks.
    pub accepting_tasks: bool,
}

/// Pause/resume intake, reset counters and report queue status.
#[derive(Clone)]
pub struct ControlApi<S> {
    queue: WorkQueue<S>,
    counters: Arc<ActiveCounters>,
}

impl<S> ControlApi<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Wrap a queue and its counters.
    pub fn new(queue: WorkQueue<S>, counters: Arc<ActiveCounters>) -> Self {
        Self { queue, counters }
    }

    /// Stop feeding new tasks into the queue.
    pub fn stop_intake(&self) -> ControlResponse {
        self.queue.stop_intake();
        ControlResponse::new("queue intake stopped")
    }

    /// Resume feeding new tasks.
    pub fn start_intake(&self) -> ControlResponse {
        self.queue.start_intake();
        ControlResponse::new("queue intake started")
    }

    /// Zero the active and per-kind counters.
    pub fn reset_counters(&self) -> ControlResponse {
        self.counters.reset();
        info!("active counters reset");
        ControlResponse::new("counters reset")
    }

    /// Queue snapshot.
    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Liveness.
    pub fn health(&self) -> Health {
        Health {
            ok: true,
            accepting_tasks: self.queue.is_accepting(),
        }
    }
}
