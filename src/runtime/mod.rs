//! Runtime adapters, the orchestrator loop and the control surface.

pub mod api;
pub mod orchestrator;
pub mod tokio_spawner;

pub use api::{ControlApi, ControlResponse, Health};
pub use orchestrator::Orchestrator;
pub use tokio_spawner::TokioSpawner;
