//! Configuration models for the orchestrator, retry tiers and maintenance jobs.

pub mod orchestrator;

pub use orchestrator::{
    MaintenanceIntervals, OrchestratorConfig, ReconcileConfig, ResourceConfig, RetryConfig,
    TierConfig,
};
