//! Infrastructure adapters for task storage and resource pools.

pub mod resources;
pub mod store;

pub use resources::InMemoryResourcePool;
pub use store::InMemoryTaskStore;
