//! Reduction of a timeline into a [`TimeSummary`].

use crate::clock::Clock;

use super::types::{EventKind, TimeSummary, Timeline};

/// Summarize a timeline as of `now_ms`.
///
/// Walks events in ascending timestamp order:
/// - a clock-in moves `origin` to its timestamp and restarts the worked
///   total at minus the break time accumulated so far
/// - a break opens a break span; the matching end-of-break adds the span to
///   the break total
/// - a clock-out adds the span since `origin` and subtracts the break total
///
/// A clock-in that has not been closed by a clock-out contributes nothing to
/// `time_worked` yet. `on_break` is true when the last event opens a break,
/// and `on_break_for` is then the time since that event.
///
/// An empty timeline yields a zeroed summary with no origin. Spans that do
/// not fit in an `i64` saturate.
pub fn reduce(events: &Timeline, now_ms: i64) -> TimeSummary {
  let Some((first, _)) = events.first() else {
    return TimeSummary::default();
  };

  let mut time = 0i64;
  let mut break_time = 0i64;
  let mut break_start: Option<i64> = None;
  let mut origin = first;
  let mut job = None;

  let last = events.last();
  let on_break = matches!(last, Some((_, event)) if event.kind == EventKind::BreakStart);

  for (key, event) in events.iter() {
    job = Some(event.job.as_str());

    match event.kind {
      EventKind::ClockIn => {
        origin = key;
        time = origin.saturating_sub(key).saturating_sub(break_time);
      }
      EventKind::BreakStart => {
        break_start = Some(key);
      }
      EventKind::BreakEnd => {
        if let Some(start) = break_start.take() {
          break_time = break_time.saturating_add(key.saturating_sub(start));
        }
      }
      EventKind::ClockOut => {
        time = time
          .saturating_add(key.saturating_sub(origin))
          .saturating_sub(break_time);
      }
    }
  }

  let on_break_for = match last {
    Some((last_key, _)) if on_break => now_ms.saturating_sub(last_key),
    _ => 0,
  };

  TimeSummary {
    break_time,
    time_worked: time,
    job: job.map(String::from),
    origin: Some(origin),
    on_break,
    on_break_for,
  }
}

/// [`reduce`] using the clock's current time.
pub fn reduce_at(events: &Timeline, clock: &dyn Clock) -> TimeSummary {
  reduce(events, clock.now_millis())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::records::types::ClockEvent;

  fn timeline(events: &[(i64, EventKind)]) -> Timeline {
    events
      .iter()
      .map(|(at, kind)| (*at, ClockEvent::new(*kind, "jobX")))
      .collect()
  }

  #[test]
  fn test_completed_shift_with_break() {
    let events = timeline(&[
      (0, EventKind::ClockIn),
      (100_000, EventKind::BreakStart),
      (200_000, EventKind::BreakEnd),
      (300_000, EventKind::ClockOut),
    ]);

    let summary = reduce(&events, 1_000_000);
    assert_eq!(
      summary,
      TimeSummary {
        break_time: 100_000,
        time_worked: 200_000,
        job: Some("jobX".to_string()),
        origin: Some(0),
        on_break: false,
        on_break_for: 0,
      }
    );
  }

  #[test]
  fn test_currently_on_break() {
    let events = timeline(&[(0, EventKind::ClockIn), (50_000, EventKind::BreakStart)]);

    let summary = reduce(&events, 80_000);
    assert!(summary.on_break);
    assert_eq!(summary.on_break_for, 30_000);
    assert_eq!(summary.break_time, 0);
  }

  #[test]
  fn test_reduce_at_uses_clock() {
    let events = timeline(&[(0, EventKind::ClockIn), (50_000, EventKind::BreakStart)]);
    let clock = ManualClock::at_millis(65_000);
    assert_eq!(reduce_at(&events, &clock).on_break_for, 15_000);
  }

  #[test]
  fn test_empty_timeline_is_zeroed() {
    let summary = reduce(&Timeline::new(), 123);
    assert_eq!(summary, TimeSummary::default());
    assert_eq!(summary.origin, None);
  }

  #[test]
  fn test_open_clock_in_counts_nothing() {
    let events = timeline(&[(10_000, EventKind::ClockIn)]);
    let summary = reduce(&events, 999_999);
    assert_eq!(summary.time_worked, 0);
    assert_eq!(summary.origin, Some(10_000));
    assert!(!summary.on_break);
  }

  #[test]
  fn test_break_starting_at_zero_is_counted() {
    let events = timeline(&[
      (0, EventKind::BreakStart),
      (5_000, EventKind::BreakEnd),
    ]);
    assert_eq!(reduce(&events, 5_000).break_time, 5_000);
  }

  #[test]
  fn test_unmatched_break_end_is_ignored() {
    let events = timeline(&[
      (0, EventKind::ClockIn),
      (1_000, EventKind::BreakEnd),
      (4_000, EventKind::ClockOut),
    ]);
    let summary = reduce(&events, 4_000);
    assert_eq!(summary.break_time, 0);
    assert_eq!(summary.time_worked, 4_000);
  }

  #[test]
  fn test_job_follows_latest_event() {
    let events: Timeline = [
      (0, ClockEvent::new(EventKind::ClockIn, "kitchen")),
      (1_000, ClockEvent::new(EventKind::ClockOut, "kitchen")),
      (2_000, ClockEvent::new(EventKind::ClockIn, "register")),
    ]
    .into_iter()
    .collect();

    assert_eq!(reduce(&events, 3_000).job.as_deref(), Some("register"));
  }

  #[test]
  fn test_second_clock_in_restarts_the_total() {
    let events = timeline(&[
      (0, EventKind::ClockIn),
      (10_000, EventKind::ClockOut),
      (20_000, EventKind::ClockIn),
      (25_000, EventKind::ClockOut),
    ]);

    let summary = reduce(&events, 30_000);
    assert_eq!(summary.origin, Some(20_000));
    assert_eq!(summary.time_worked, 5_000);
  }

  #[test]
  fn test_result_is_reproducible() {
    let events = timeline(&[
      (0, EventKind::ClockIn),
      (7_000, EventKind::BreakStart),
      (9_000, EventKind::BreakEnd),
    ]);
    assert_eq!(reduce(&events, 10_000), reduce(&events, 10_000));
  }

  #[test]
  fn test_extreme_timestamps_saturate() {
    let events = timeline(&[(i64::MIN, EventKind::ClockIn), (i64::MAX, EventKind::ClockOut)]);
    assert_eq!(reduce(&events, 0).time_worked, i64::MAX);

    let events = timeline(&[(i64::MIN, EventKind::BreakStart)]);
    let summary = reduce(&events, 1_700_000_000_000);
    assert!(summary.on_break);
    assert_eq!(summary.on_break_for, i64::MAX);
  }
}
