//! Tests for utility functions

use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use likes_orchestrator::util::{init_tracing, to_delta, Clock, ManualClock};

#[tokio::test]
async fn test_manual_clock_sleep_advances_time() {
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let clock = ManualClock::new(start);
    clock.sleep(Duration::from_secs(180)).await;
    assert_eq!(clock.now(), start + TimeDelta::seconds(180));

    clock.advance(Duration::from_millis(500));
    assert_eq!(clock.now(), start + TimeDelta::milliseconds(180_500));

    clock.set(start);
    assert_eq!(clock.now(), start);
}

#[test]
fn test_to_delta() {
    assert_eq!(to_delta(Duration::from_secs(300)), TimeDelta::minutes(5));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
