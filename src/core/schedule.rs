//! Slot generation.
//!
//! A slot is one future instant at which the work queue may attempt a single
//! action for a task. Every function here yields strictly increasing slots
//! spaced at least the minimum interval apart.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::util::clock::to_delta;

/// Spread `count` slots over `window` starting at `start`.
///
/// The gap is `max(window / count, min_interval)`. When the window is too
/// short, slots compress to the minimum spacing and may run past its end.
/// Slots that would fall past the representable date range are dropped.
pub fn distribute_slots(
    start: DateTime<Utc>,
    window: Duration,
    count: u32,
    min_interval: Duration,
) -> Vec<DateTime<Utc>> {
    if count == 0 {
        return Vec::new();
    }
    let gap = to_delta((window / count).max(min_interval));
    std::iter::successors(Some(start), |slot| slot.checked_add_signed(gap))
        .take(usize::try_from(count).unwrap_or(usize::MAX))
        .collect()
}

/// Window used for a fresh schedule: `[date_start, date_end]` when both are
/// set and ordered, otherwise `default_window` from `date_start` or `now`.
pub fn initial_window(
    date_start: Option<DateTime<Utc>>,
    date_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    default_window: Duration,
) -> (DateTime<Utc>, Duration) {
    if let (Some(start), Some(end)) = (date_start, date_end) {
        if start < end {
            if let Ok(window) = (end - start).to_std() {
                return (start, window);
            }
        }
    }
    (date_start.unwrap_or(now), default_window)
}

/// Slot appended when a retry tier is exhausted; `None` past the
/// representable date range.
pub fn escalation_slot(
    schedule: &[DateTime<Utc>],
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Option<DateTime<Utc>> {
    schedule.last().map_or(Some(now), |last| {
        last.checked_add_signed(to_delta(min_interval))
    })
}

/// `count` make-up slots after the existing schedule, never before `now`.
pub fn makeup_slots(
    schedule: &[DateTime<Utc>],
    now: DateTime<Utc>,
    count: u32,
    min_interval: Duration,
) -> Vec<DateTime<Utc>> {
    let from = match schedule.last() {
        Some(last) => match last.checked_add_signed(to_delta(min_interval)) {
            Some(next) => next.max(now),
            None => return Vec::new(),
        },
        None => now,
    };
    distribute_slots(from, Duration::ZERO, count, min_interval)
}
