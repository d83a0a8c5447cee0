//! Orchestrator: owns every service and drives the maintenance loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::OrchestratorConfig;
use crate::core::{
    ActiveCounters, AlertHandle, BalanceGate, IncompleteRecovery, Intake, MaintenanceJob,
    MaintenanceScheduler, OrchestratorError, ReconciliationService, Spawn, WorkQueue,
};
use crate::runtime::api::ControlApi;
use crate::util::clock::Clock;

/// Assembled orchestrator. Build with
/// [`OrchestratorBuilder`](crate::builders::OrchestratorBuilder).
pub struct Orchestrator<S> {
    pub(crate) config: OrchestratorConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) alerts: AlertHandle,
    pub(crate) counters: Arc<ActiveCounters>,
    pub(crate) queue: WorkQueue<S>,
    pub(crate) intake: Intake,
    pub(crate) gate: BalanceGate,
    pub(crate) recovery: IncompleteRecovery,
    pub(crate) reconcile: ReconciliationService,
    pub(crate) scheduler: Mutex<MaintenanceScheduler>,
    pub(crate) stopped: AtomicBool,
}

impl<S> Orchestrator<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Configuration in use.
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Work queue.
    pub const fn queue(&self) -> &WorkQueue<S> {
        &self.queue
    }

    /// Shared active counters.
    pub fn counters(&self) -> Arc<ActiveCounters> {
        Arc::clone(&self.counters)
    }

    /// Control surface over the queue and counters.
    pub fn control(&self) -> ControlApi<S> {
        ControlApi::new(self.queue.clone(), Arc::clone(&self.counters))
    }

    /// Start the queue workers.
    pub fn start(&self) {
        self.queue.start();
    }

    /// Run one job now. Errors are returned, not alerted.
    pub async fn run_job(&self, job: MaintenanceJob) -> Result<(), OrchestratorError> {
        debug!(job = job.name(), "running maintenance job");
        match job {
            MaintenanceJob::Intake => {
                let promoted = self.intake.promote_due().await?;
                if !promoted.is_empty() {
                    info!(count = promoted.len(), "intake promoted tasks");
                }
            }
            MaintenanceJob::Dispatch => {
                self.queue.dispatch_ready().await?;
            }
            MaintenanceJob::QueueReport => {
                let status = self.queue.status();
                info!(
                    queue_length = status.queue_length,
                    is_processing = status.is_processing,
                    accepting = status.accepting_tasks,
                    active = status.active_count,
                    "queue status"
                );
            }
            MaintenanceJob::Reconcile => {
                self.reconcile.run().await?;
            }
            MaintenanceJob::IncompleteRecovery => {
                let recovered = self.recovery.recover().await?;
                if !recovered.is_empty() {
                    info!(count = recovered.len(), "incomplete tasks recovered");
                }
            }
            MaintenanceJob::NoFundsRecovery => {
                let resumed = self.gate.resume_funded().await?;
                if !resumed.is_empty() {
                    info!(count = resumed.len(), "funded tasks resumed");
                }
            }
        }
        Ok(())
    }

    /// Run every job due at the clock's current time. A failing job is logged
    /// and alerted; the others still run.
    pub async fn tick(&self) -> Vec<MaintenanceJob> {
        let now = self.clock.now();
        let due = self.scheduler.lock().due(now);
        for job in &due {
            if let Err(err) = self.run_job(*job).await {
                error!(job = job.name(), "maintenance job failed: {err}");
                self.alerts.send(job.name(), &err, self.clock.now());
            }
        }
        due
    }

    /// Start the workers and tick until [`Orchestrator::stop`] is called.
    pub async fn run(&self) {
        self.start();
        info!("orchestrator running");
        while !self.stopped.load(Ordering::Acquire) {
            self.tick().await;
            let now = self.clock.now();
            let wait = self
                .scheduler
                .lock()
                .next_wakeup()
                .and_then(|at| (at - now).to_std().ok())
                .unwrap_or(Duration::from_secs(1));
            self.clock.sleep(wait).await;
        }
        self.queue.shutdown();
        info!("orchestrator stopped");
    }

    /// Ask [`Orchestrator::run`] to exit after its current wait.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}
