//! Proxy and account pool backends.

pub mod memory;

pub use memory::InMemoryResourcePool;
