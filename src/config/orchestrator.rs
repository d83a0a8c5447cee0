//! Orchestrator configuration structures.

use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::core::maintenance::MaintenanceJob;
use crate::core::reconcile::ReconcileSettings;
use crate::core::resources::AcquireLimits;
use crate::core::retry::{Exhaustion, RequeuePosition, RetryPolicy, RetryTable};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LIKES_";

/// Longest accepted spreading window (one year), in seconds.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

/// One retry tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Retries allowed after the first attempt.
    pub ceiling: u32,
    /// Backoff before requeue, in seconds.
    pub backoff_secs: u64,
}

/// Retry tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Tier A: executor rejected the action.
    pub action_failed: TierConfig,
    /// Tier B: proxy or account unavailable.
    pub resource_unavailable: TierConfig,
    /// Tier C: other recoverable errors.
    pub recoverable: TierConfig,
}

impl From<&RetryPolicy> for TierConfig {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            ceiling: policy.ceiling,
            backoff_secs: policy.backoff.as_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let table = RetryTable::default();
        Self {
            action_failed: TierConfig::from(&table.action_failed),
            resource_unavailable: TierConfig::from(&table.resource_unavailable),
            recoverable: TierConfig::from(&table.recoverable),
        }
    }
}

/// Resource acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Attempts per acquisition (proxy and account each).
    pub acquire_attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub acquire_delay_ms: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            acquire_attempts: 10,
            acquire_delay_ms: 1000,
        }
    }
}

/// Reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Records processed per run.
    pub max_per_run: usize,
    /// `retry_amount` at which drift is treated as confirmed.
    pub drift_threshold: u32,
    /// Minimum time between two picks of the same record, in seconds.
    pub gate_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_per_run: 3,
            drift_threshold: 5,
            gate_secs: 30 * 60,
        }
    }
}

/// Periods of the maintenance jobs, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceIntervals {
    /// Promote `created` records.
    pub intake_secs: u64,
    /// Feed ready slots into the queue.
    pub dispatch_secs: u64,
    /// Log queue status.
    pub queue_report_secs: u64,
    /// Repair completed-but-short records.
    pub incomplete_recovery_secs: u64,
    /// Resume funded `nofunds` records.
    pub nofunds_recovery_secs: u64,
    /// Reconcile against external counts.
    pub reconcile_secs: u64,
}

impl Default for MaintenanceIntervals {
    fn default() -> Self {
        Self {
            intake_secs: 20,
            dispatch_secs: 25,
            queue_report_secs: 20,
            incomplete_recovery_secs: 30,
            nofunds_recovery_secs: 35,
            reconcile_secs: 600,
        }
    }
}

impl MaintenanceIntervals {
    /// `(job, period)` pairs for the maintenance scheduler.
    pub const fn periods(&self) -> [(MaintenanceJob, Duration); 6] {
        [
            (MaintenanceJob::Intake, Duration::from_secs(self.intake_secs)),
            (MaintenanceJob::Dispatch, Duration::from_secs(self.dispatch_secs)),
            (MaintenanceJob::QueueReport, Duration::from_secs(self.queue_report_secs)),
            (
                MaintenanceJob::IncompleteRecovery,
                Duration::from_secs(self.incomplete_recovery_secs),
            ),
            (
                MaintenanceJob::NoFundsRecovery,
                Duration::from_secs(self.nofunds_recovery_secs),
            ),
            (MaintenanceJob::Reconcile, Duration::from_secs(self.reconcile_secs)),
        ]
    }

    fn validate(&self) -> Result<(), String> {
        let all = [
            ("intake_secs", self.intake_secs),
            ("dispatch_secs", self.dispatch_secs),
            ("queue_report_secs", self.queue_report_secs),
            ("incomplete_recovery_secs", self.incomplete_recovery_secs),
            ("nofunds_recovery_secs", self.nofunds_recovery_secs),
            ("reconcile_secs", self.reconcile_secs),
        ];
        for (name, value) in all {
            if value == 0 {
                return Err(format!("intervals.{name} must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// Root orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum concurrent pipelines.
    pub concurrency: usize,
    /// Price charged per successful action.
    pub price_per_action: Decimal,
    /// Minimum spacing between two slots of one task, in milliseconds.
    pub minimum_interval_ms: u64,
    /// Spreading window when the record has none, in seconds.
    pub default_window_secs: u64,
    /// Resource acquisition.
    pub resources: ResourceConfig,
    /// Retry tiers.
    pub retry: RetryConfig,
    /// Reconciliation.
    pub reconcile: ReconcileConfig,
    /// Maintenance job periods.
    pub intervals: MaintenanceIntervals,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            price_per_action: Decimal::from(5),
            minimum_interval_ms: 300_000,
            default_window_secs: 3 * 3600,
            resources: ResourceConfig::default(),
            retry: RetryConfig::default(),
            reconcile: ReconcileConfig::default(),
            intervals: MaintenanceIntervals::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".into());
        }
        if self.price_per_action.is_sign_negative() {
            return Err("price_per_action must not be negative".into());
        }
        if self.minimum_interval_ms == 0 {
            return Err("minimum_interval_ms must be greater than 0".into());
        }
        if self.default_window_secs == 0 {
            return Err("default_window_secs must be greater than 0".into());
        }
        if self.default_window_secs > MAX_WINDOW_SECS {
            return Err(format!("default_window_secs must not exceed {MAX_WINDOW_SECS}"));
        }
        if self.resources.acquire_attempts == 0 {
            return Err("resources.acquire_attempts must be greater than 0".into());
        }
        if self.reconcile.max_per_run == 0 {
            return Err("reconcile.max_per_run must be greater than 0".into());
        }
        self.intervals.validate()
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the process environment.
    ///
    /// Reads `.env` if present, then `LIKES_CONFIG_FILE` (JSON) if set, then
    /// applies `LIKES_CONCURRENCY`, `LIKES_PRICE_PER_ACTION`,
    /// `LIKES_MINIMUM_INTERVAL_MS` and `LIKES_DEFAULT_WINDOW_SECS` on top.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build from a variable lookup (keys without the prefix).
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut cfg: Self = match lookup("CONFIG_FILE") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))?
            }
            None => Self::default(),
        };

        if let Some(v) = lookup("CONCURRENCY") {
            cfg.concurrency = v.parse().context("LIKES_CONCURRENCY")?;
        }
        if let Some(v) = lookup("PRICE_PER_ACTION") {
            cfg.price_per_action = v.parse().context("LIKES_PRICE_PER_ACTION")?;
        }
        if let Some(v) = lookup("MINIMUM_INTERVAL_MS") {
            cfg.minimum_interval_ms = v.parse().context("LIKES_MINIMUM_INTERVAL_MS")?;
        }
        if let Some(v) = lookup("DEFAULT_WINDOW_SECS") {
            cfg.default_window_secs = v.parse().context("LIKES_DEFAULT_WINDOW_SECS")?;
        }

        cfg.validate().map_err(|e| anyhow::anyhow!("config invalid: {e}"))?;
        Ok(cfg)
    }

    /// Minimum slot spacing.
    pub const fn minimum_interval(&self) -> Duration {
        Duration::from_millis(self.minimum_interval_ms)
    }

    /// Default spreading window.
    pub const fn default_window(&self) -> Duration {
        Duration::from_secs(self.default_window_secs)
    }

    /// Acquisition limits for proxies and accounts.
    pub const fn acquire_limits(&self) -> AcquireLimits {
        AcquireLimits {
            attempts: self.resources.acquire_attempts,
            delay: Duration::from_millis(self.resources.acquire_delay_ms),
        }
    }

    /// Retry table built from the tier settings.
    pub const fn retry_table(&self) -> RetryTable {
        RetryTable {
            action_failed: tier(self.retry.action_failed, Exhaustion::EscalateSchedule),
            resource_unavailable: tier(
                self.retry.resource_unavailable,
                Exhaustion::EscalateSchedule,
            ),
            recoverable: tier(self.retry.recoverable, Exhaustion::ReleaseOnly),
        }
    }

    /// Reconciliation settings.
    pub const fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            max_per_run: self.reconcile.max_per_run,
            drift_threshold: self.reconcile.drift_threshold,
            gate: Duration::from_secs(self.reconcile.gate_secs),
            minimum_interval: self.minimum_interval(),
        }
    }
}

const fn tier(cfg: TierConfig, on_exhaustion: Exhaustion) -> RetryPolicy {
    RetryPolicy {
        ceiling: cfg.ceiling,
        backoff: Duration::from_secs(cfg.backoff_secs),
        requeue: RequeuePosition::Front,
        on_exhaustion,
    }
}
