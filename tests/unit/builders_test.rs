//! Tests for the orchestrator builder

use std::sync::Arc;

use likes_orchestrator::builders::OrchestratorBuilder;
use likes_orchestrator::config::OrchestratorConfig;
use likes_orchestrator::core::OrchestratorError;
use likes_orchestrator::infra::{InMemoryResourcePool, InMemoryTaskStore};
use likes_orchestrator::runtime::TokioSpawner;

#[tokio::test]
async fn test_builder_requires_collaborators() {
    let result = OrchestratorBuilder::new(OrchestratorConfig::default(), TokioSpawner::current())
        .store(Arc::new(InMemoryTaskStore::new()))
        .resources(Arc::new(InMemoryResourcePool::new()))
        .build();
    match result {
        Err(OrchestratorError::Config(msg)) => assert_eq!(msg, "missing action executor"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("builder accepted a missing executor"),
    }
}

#[tokio::test]
async fn test_builder_validates_config() {
    let config = OrchestratorConfig {
        concurrency: 0,
        ..OrchestratorConfig::default()
    };
    let result = OrchestratorBuilder::new(config, TokioSpawner::current()).build();
    assert!(matches!(result, Err(OrchestratorError::Config(msg)) if msg.contains("concurrency")));
}

#[test]
fn test_spawner_needs_a_runtime() {
    assert!(TokioSpawner::try_current().is_err());
}
