//! Tests for error types

use likes_orchestrator::core::{
    ActionError, OrchestratorError, ResourceKind, StoreError, TaskStatus,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[test]
fn test_resource_unavailable_error() {
    let err = OrchestratorError::ResourceUnavailable(ResourceKind::Account);
    assert_eq!(format!("{}", err), "resource unavailable: account");
}

#[test]
fn test_action_error_display() {
    let err = ActionError::ResourceUnavailable(ResourceKind::Proxy);
    assert_eq!(format!("{}", err), "no available proxy");
    let err = ActionError::Transient("timeout".to_string());
    assert_eq!(format!("{}", err), "transient failure: timeout");
}

#[test]
fn test_insufficient_balance_error() {
    let user = Uuid::nil();
    let err = OrchestratorError::InsufficientBalance {
        user,
        required: Decimal::from(10),
        available: Decimal::from(4),
    };
    assert_eq!(
        format!("{}", err),
        format!("insufficient balance for user {user}: required 10, available 4")
    );
}

#[test]
fn test_invalid_transition_error() {
    let task = Uuid::nil();
    let err = OrchestratorError::InvalidTransition {
        task,
        from: TaskStatus::Created,
        to: TaskStatus::Completed,
    };
    assert_eq!(
        format!("{}", err),
        format!("invalid transition for task {task}: created -> completed")
    );
}

#[test]
fn test_store_error_is_transparent() {
    let err: OrchestratorError = StoreError::Backend("connection failed".to_string()).into();
    assert_eq!(format!("{}", err), "backend error: connection failed");
    assert!(!err.is_transient());
}

#[test]
fn test_only_unavailable_store_is_transient() {
    let err: OrchestratorError = StoreError::Unavailable("down".to_string()).into();
    assert!(err.is_transient());
    assert!(!OrchestratorError::RecordMissing(Uuid::nil()).is_transient());
    assert!(!OrchestratorError::LedgerWriteFailure {
        task: Uuid::nil(),
        reason: "x".into(),
    }
    .is_transient());
}
