//! Builder assembling an [`Orchestrator`] from configuration and collaborators.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::OrchestratorConfig;
use crate::core::{
    ActionExecutor, ActiveCounters, AlertHandle, BalanceGate, IncompleteRecovery, Intake,
    MaintenanceScheduler, OrchestratorError, Pipeline, ReconciliationService, ResourcePool,
    ReviewCounter, Spawn, TaskStore, WorkQueue,
};
use crate::runtime::Orchestrator;
use crate::util::clock::{Clock, SystemClock};

/// Collects collaborators, then validates the configuration and wires every
/// service.
pub struct OrchestratorBuilder<S> {
    config: OrchestratorConfig,
    spawner: S,
    store: Option<Arc<dyn TaskStore>>,
    resources: Option<Arc<dyn ResourcePool>>,
    executor: Option<Arc<dyn ActionExecutor>>,
    counter: Option<Arc<dyn ReviewCounter>>,
    clock: Arc<dyn Clock>,
    alerts: AlertHandle,
}

impl<S> OrchestratorBuilder<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Start from a configuration and a spawner. Defaults to the system clock
    /// and a tracing alert sink.
    pub fn new(config: OrchestratorConfig, spawner: S) -> Self {
        Self {
            config,
            spawner,
            store: None,
            resources: None,
            executor: None,
            counter: None,
            clock: Arc::new(SystemClock),
            alerts: AlertHandle::tracing(),
        }
    }

    /// Task store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Proxy and account pool.
    #[must_use]
    pub fn resources(mut self, resources: Arc<dyn ResourcePool>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Action executor.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// External review counter.
    #[must_use]
    pub fn review_counter(mut self, counter: Arc<dyn ReviewCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Alert destination.
    #[must_use]
    pub fn alerts(mut self, alerts: AlertHandle) -> Self {
        self.alerts = alerts;
        self
    }

    /// Validate and assemble.
    pub fn build(self) -> Result<Orchestrator<S>, OrchestratorError> {
        let cfg = self.config;
        cfg.validate().map_err(OrchestratorError::Config)?;

        let store = self.store.ok_or_else(|| missing("task store"))?;
        let resources = self.resources.ok_or_else(|| missing("resource pool"))?;
        let executor = self.executor.ok_or_else(|| missing("action executor"))?;
        let counter = self.counter.ok_or_else(|| missing("review counter"))?;
        let clock = self.clock;
        let alerts = self.alerts;

        let gate = BalanceGate::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            alerts.clone(),
            cfg.price_per_action,
            cfg.default_window(),
            cfg.minimum_interval(),
        );
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            resources,
            executor,
            Arc::clone(&counter),
            Arc::clone(&clock),
            alerts.clone(),
            gate.clone(),
            cfg.acquire_limits(),
        );
        let counters = ActiveCounters::new();
        let queue = WorkQueue::new(
            pipeline,
            Arc::clone(&counters),
            Arc::clone(&store),
            Arc::clone(&clock),
            alerts.clone(),
            cfg.retry_table(),
            cfg.concurrency,
            cfg.minimum_interval(),
            self.spawner,
        );
        let intake = Intake::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            alerts.clone(),
            cfg.default_window(),
            cfg.minimum_interval(),
        );
        let recovery = IncompleteRecovery::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            cfg.default_window(),
            cfg.minimum_interval(),
        );
        let reconcile = ReconciliationService::new(
            store,
            counter,
            Arc::clone(&clock),
            alerts.clone(),
            cfg.reconcile_settings(),
        );
        let scheduler = MaintenanceScheduler::new(cfg.intervals.periods(), clock.now());

        Ok(Orchestrator {
            config: cfg,
            clock,
            alerts,
            counters,
            queue,
            intake,
            gate,
            recovery,
            reconcile,
            scheduler: Mutex::new(scheduler),
            stopped: AtomicBool::new(false),
        })
    }
}

fn missing(what: &str) -> OrchestratorError {
    OrchestratorError::Config(format!("missing {what}"))
}
