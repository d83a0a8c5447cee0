//! # Likes Orchestrator
//!
//! A balance-gated, rate-spread task orchestration engine for per-review
//! engagement workloads.
//!
//! Each task record asks for a number of likes and dislikes on the reviews of
//! one item of an external platform. The orchestrator spreads those actions
//! over time, runs them through a bounded pool of workers that rotate proxies
//! and disposable accounts, bills every successful action against the owner's
//! balance and periodically cross-checks its own bookkeeping against the
//! counts the platform reports.
//!
//! ## Components
//!
//! - **Intake**: promotes `created` records to `work` and writes their slot
//!   schedule.
//! - **WorkQueue**: `C` workers; dispatch removes a due slot from the store
//!   before a task is queued, retries go back to the front.
//! - **Pipeline**: fetch, balance check, baseline capture, review selection,
//!   resource acquisition, execute, settle, release.
//! - **RetryTable**: tier A (action failed, 3), tier B (resource unavailable,
//!   10 with 180 s backoff), tier C (other recoverable errors, 10).
//! - **ReconciliationService**: compares recorded progress with external
//!   counts and repairs confirmed drift with make-up slots.
//! - **BalanceGate** and **IncompleteRecovery**: move records between `work`,
//!   `nofunds` and `completed` when funds or counters say so.
//! - **Orchestrator**: explicit maintenance loop over an injectable clock.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use likes_orchestrator::builders::OrchestratorBuilder;
//! use likes_orchestrator::config::OrchestratorConfig;
//! use likes_orchestrator::infra::{InMemoryResourcePool, InMemoryTaskStore};
//! use likes_orchestrator::runtime::TokioSpawner;
//!
//! let orchestrator = OrchestratorBuilder::new(OrchestratorConfig::from_env()?, TokioSpawner::current())
//!     .store(Arc::new(InMemoryTaskStore::new()))
//!     .resources(Arc::new(InMemoryResourcePool::new()))
//!     .executor(Arc::new(my_executor))
//!     .review_counter(Arc::new(my_counter))
//!     .build()?;
//!
//! orchestrator.run().await;
//! ```
//!
//! For complete scenarios, see the integration tests under `tests/`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core orchestration: task model, pipeline, work queue and periodic services.
pub mod core;
/// Configuration models for the orchestrator, retry tiers and maintenance jobs.
pub mod config;
/// Builders to construct the orchestrator from configuration.
pub mod builders;
/// Infrastructure adapters for task storage and resource pools.
pub mod infra;
/// Runtime adapters, the orchestrator loop and the control surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
