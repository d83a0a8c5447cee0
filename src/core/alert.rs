//! Alert sink implementations.
//!
//! Alerts are a fire-and-forget side channel mirroring every failure. They
//! never influence control flow.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Alert structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Component that raised the alert (pipeline, reconcile, intake, ...).
    pub source: String,
    /// Human-readable message.
    pub message: String,
    /// Time of the alert.
    pub created_at: DateTime<Utc>,
}

/// Alert sink abstraction.
pub trait AlertSink: Send {
    /// Record an alert.
    fn record(&mut self, alert: Alert);
}

/// In-memory alert sink for testing and dev.
pub struct InMemoryAlertSink {
    alerts: VecDeque<Alert>,
    max_alerts: usize,
}

impl InMemoryAlertSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_alerts: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(max_alerts),
            max_alerts,
        }
    }

    /// Retrieve a snapshot of stored alerts.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}

impl AlertSink for InMemoryAlertSink {
    fn record(&mut self, alert: Alert) {
        if self.alerts.len() >= self.max_alerts {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }
}

/// Sink that only emits a `warn!` event per alert.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn record(&mut self, alert: Alert) {
        warn!(source = %alert.source, "alert: {}", alert.message);
    }
}

/// Shared, cloneable handle over a boxed sink.
#[derive(Clone)]
pub struct AlertHandle {
    sink: Arc<Mutex<Box<dyn AlertSink>>>,
}

impl AlertHandle {
    /// Wrap a sink.
    pub fn new(sink: impl AlertSink + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Handle writing to a [`TracingAlertSink`].
    pub fn tracing() -> Self {
        Self::new(TracingAlertSink)
    }

    /// Forward an alert to the sink.
    pub fn send(&self, source: &str, message: impl std::fmt::Display, at: DateTime<Utc>) {
        self.sink.lock().record(build_alert(source, message, at));
    }
}

impl std::fmt::Debug for AlertHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertHandle").finish_non_exhaustive()
    }
}

/// Helper to build an alert from context.
pub fn build_alert(source: &str, message: impl std::fmt::Display, at: DateTime<Utc>) -> Alert {
    Alert {
        source: source.to_string(),
        message: message.to_string(),
        created_at: at,
    }
}

/// Sink that forwards into a shared [`InMemoryAlertSink`], so tests can keep
/// a reader handle.
#[derive(Clone)]
pub struct SharedMemorySink(pub Arc<Mutex<InMemoryAlertSink>>);

impl SharedMemorySink {
    /// New shared sink with a bounded buffer.
    pub fn new(max_alerts: usize) -> Self {
        Self(Arc::new(Mutex::new(InMemoryAlertSink::new(max_alerts))))
    }

    /// Snapshot of recorded alerts.
    pub fn alerts(&self) -> Vec<Alert> {
        self.0.lock().alerts()
    }
}

impl AlertSink for SharedMemorySink {
    fn record(&mut self, alert: Alert) {
        self.0.lock().record(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_is_bounded() {
        let now = Utc::now();
        let mut sink = InMemoryAlertSink::new(2);
        for i in 0..3 {
            sink.record(build_alert("pipeline", format!("failure {i}"), now));
        }
        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].message, "failure 1");
        assert_eq!(alerts[1].message, "failure 2");
    }

    #[test]
    fn handle_forwards_to_shared_sink() {
        let shared = SharedMemorySink::new(8);
        let handle = AlertHandle::new(shared.clone());
        handle.send("reconcile", "query failed", Utc::now());

        let alerts = shared.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source, "reconcile");
    }
}
