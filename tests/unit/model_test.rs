//! Tests for the task record model and its lifecycle

use likes_orchestrator::core::{ActionKind, ReviewTarget, TaskRecord, TaskStatus};
use uuid::Uuid;

#[test]
fn test_new_record_totals_desired_actions() {
    let task = TaskRecord::new(
        Uuid::new_v4(),
        "article",
        vec![ReviewTarget::new("r1", 2, 1), ReviewTarget::new("r2", 0, 3)],
    );
    assert_eq!(task.status, TaskStatus::Created);
    assert_eq!(task.total, 6);
    assert_eq!(task.remaining_actions(), 6);
    assert_eq!(task.kind, "likes");
}

#[test]
fn test_next_action_prefers_likes_in_review_order() {
    let task = TaskRecord::new(
        Uuid::new_v4(),
        "article",
        vec![ReviewTarget::new("r1", 0, 1), ReviewTarget::new("r2", 1, 0)],
    );
    let (review, action) = task.next_action().unwrap();
    assert_eq!(review.review_id, "r1");
    assert_eq!(action, ActionKind::Dislike);
}

#[test]
fn test_lifecycle_transitions() {
    use TaskStatus::{Completed, Created, NoFunds, Work};
    assert!(Created.can_transition_to(Work));
    assert!(Work.can_transition_to(NoFunds));
    assert!(NoFunds.can_transition_to(Work));
    assert!(Work.can_transition_to(Completed));
    assert!(Completed.can_transition_to(Work));

    assert!(!Created.can_transition_to(Completed));
    assert!(!NoFunds.can_transition_to(Completed));
    assert!(!Work.can_transition_to(Created));
}

#[test]
fn test_status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&TaskStatus::NoFunds).unwrap(), "\"nofunds\"");
    let status: TaskStatus = serde_json::from_str("\"work\"").unwrap();
    assert_eq!(status, TaskStatus::Work);
}

#[test]
fn test_record_round_trips_through_json() {
    let task = TaskRecord::new(Uuid::new_v4(), "article", vec![ReviewTarget::new("r1", 1, 0)]);
    let json = serde_json::to_string(&task).unwrap();
    let back: TaskRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, task);
}
