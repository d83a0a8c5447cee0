//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use likes_orchestrator::config::orchestrator::MAX_WINDOW_SECS;
use likes_orchestrator::config::OrchestratorConfig;
use likes_orchestrator::core::FailureClass;
use rust_decimal::Decimal;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = OrchestratorConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.concurrency, 5);
    assert_eq!(cfg.price_per_action, Decimal::from(5));
    assert_eq!(cfg.minimum_interval(), Duration::from_secs(300));
    assert_eq!(cfg.default_window(), Duration::from_secs(3 * 3600));
}

#[test]
fn test_zero_concurrency_is_invalid() {
    let cfg = OrchestratorConfig {
        concurrency: 0,
        ..OrchestratorConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_interval_is_invalid() {
    let mut cfg = OrchestratorConfig::default();
    cfg.intervals.dispatch_secs = 0;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("dispatch_secs"));
}

#[test]
fn test_window_beyond_a_year_is_invalid() {
    let cfg = OrchestratorConfig {
        default_window_secs: MAX_WINDOW_SECS + 1,
        ..OrchestratorConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("default_window_secs"));

    let cfg = OrchestratorConfig {
        default_window_secs: MAX_WINDOW_SECS,
        ..OrchestratorConfig::default()
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_negative_price_is_invalid() {
    let cfg = OrchestratorConfig {
        price_per_action: Decimal::from(-1),
        ..OrchestratorConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let cfg = OrchestratorConfig::from_json_str(
        r#"{"concurrency": 8, "price_per_action": "2.5", "reconcile": {"max_per_run": 10}}"#,
    )
    .unwrap();
    assert_eq!(cfg.concurrency, 8);
    assert_eq!(cfg.price_per_action, Decimal::new(25, 1));
    assert_eq!(cfg.reconcile.max_per_run, 10);
    assert_eq!(cfg.reconcile.drift_threshold, 5);
    assert_eq!(cfg.minimum_interval_ms, 300_000);
}

#[test]
fn test_invalid_json_is_rejected() {
    assert!(OrchestratorConfig::from_json_str("{not json").is_err());
    assert!(OrchestratorConfig::from_json_str(r#"{"concurrency": 0}"#).is_err());
}

#[test]
fn test_vars_override_defaults() {
    let env = vars(&[("CONCURRENCY", "3"), ("MINIMUM_INTERVAL_MS", "60000")]);
    let cfg = OrchestratorConfig::from_vars(|k| env.get(k).cloned()).unwrap();
    assert_eq!(cfg.concurrency, 3);
    assert_eq!(cfg.minimum_interval(), Duration::from_secs(60));
    assert_eq!(cfg.default_window_secs, 3 * 3600);
}

#[test]
fn test_bad_var_names_the_variable() {
    let env = vars(&[("PRICE_PER_ACTION", "five")]);
    let err = OrchestratorConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
    assert!(format!("{err:#}").contains("LIKES_PRICE_PER_ACTION"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let env = vars(&[("CONFIG_FILE", "/nonexistent/likes-config.json")]);
    assert!(OrchestratorConfig::from_vars(|k| env.get(k).cloned()).is_err());
}

#[test]
fn test_retry_table_follows_tiers() {
    let mut cfg = OrchestratorConfig::default();
    cfg.retry.resource_unavailable.backoff_secs = 30;
    let table = cfg.retry_table();
    assert_eq!(table.policy(FailureClass::ActionFailed).ceiling, 3);
    assert_eq!(
        table.policy(FailureClass::ResourceUnavailable).backoff,
        Duration::from_secs(30)
    );
    assert_eq!(table.policy(FailureClass::Recoverable).ceiling, 10);
}
