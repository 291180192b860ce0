//! Sliding-window request throttle.
//!
//! Admits at most `limit` calls per rolling `interval`. Admitted calls are
//! recorded newest-first in a [`LinkedList`] ledger; the oldest records are
//! evicted from the tail once they fall out of the window.
//!
//! When the limit is reached the throttle locks, and it stays locked until
//! every record in the ledger has aged out. Refusals are never errors.
//!
//! ```ignore
//! let throttle = Throttle::new(5, Duration::from_secs(10))?; // 5 calls every 10 seconds
//!
//! let sum = throttle.try_run(|| 10 + 15);
//! assert_eq!(sum, Some(25));
//! ```

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::collections::LinkedList;

/// Receives throttle notifications. Both hooks default to no-ops.
pub trait ThrottleObserver: Send + Sync {
  /// Called each time a call is refused.
  fn on_throttle(&self) {}

  /// Called when the throttle locks (`true`) or unlocks (`false`).
  fn on_state_change(&self, _locked: bool) {}
}

impl<O: ThrottleObserver + ?Sized> ThrottleObserver for Arc<O> {
  fn on_throttle(&self) {
    (**self).on_throttle()
  }

  fn on_state_change(&self, locked: bool) {
    (**self).on_state_change(locked)
  }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
  pub admitted: bool,
  /// This check is the one that hit the limit and locked the throttle.
  pub just_locked: bool,
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
  called_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ThrottleState {
  locked: bool,
  /// Newest at the head, oldest at the tail.
  ledger: LinkedList<CallRecord>,
}

/// Rate limiter over a rolling time window.
pub struct Throttle {
  limit: usize,
  interval: chrono::Duration,
  state: Mutex<ThrottleState>,
  clock: Arc<dyn Clock>,
  observer: Option<Arc<dyn ThrottleObserver>>,
}

impl Throttle {
  /// Create a throttle admitting `limit` calls per `interval`.
  pub fn new(limit: usize, interval: Duration) -> Result<Self> {
    if limit == 0 {
      return Err(eyre!("Throttle limit must be greater than zero"));
    }
    if interval.is_zero() {
      return Err(eyre!("Throttle interval must be greater than zero"));
    }
    let interval = chrono::Duration::from_std(interval)
      .map_err(|e| eyre!("Throttle interval out of range: {}", e))?;

    Ok(Self {
      limit,
      interval,
      state: Mutex::new(ThrottleState::default()),
      clock: Arc::new(SystemClock),
      observer: None,
    })
  }

  /// Use a different time source.
  pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  /// Attach an observer for refusals and lock state changes.
  pub fn with_observer<O: ThrottleObserver + 'static>(mut self, observer: O) -> Self {
    self.observer = Some(Arc::new(observer));
    self
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn interval(&self) -> Duration {
    self.interval.to_std().unwrap_or_default()
  }

  pub fn is_locked(&self) -> bool {
    self.state().locked
  }

  /// Number of admitted calls still inside the window, as of the last check.
  pub fn in_flight(&self) -> usize {
    self.state().ledger.len()
  }

  /// Run one admission check, recording the call if it is admitted.
  pub fn check(&self) -> Admission {
    let now = self.clock.now();
    let mut unlocked = false;

    let admission = {
      let mut state = self.state();

      // Trim the oldest records.
      loop {
        let expired = state
          .ledger
          .tail()
          .is_some_and(|oldest| now - oldest.called_at > self.interval);
        if !expired {
          break;
        }
        state.ledger.pop();
      }

      if state.ledger.is_empty() && state.locked {
        state.locked = false;
        unlocked = true;
      }

      if state.locked {
        Admission {
          admitted: false,
          just_locked: false,
        }
      } else if state.ledger.len() >= self.limit {
        state.locked = true;
        Admission {
          admitted: false,
          just_locked: true,
        }
      } else {
        state.ledger.prepend(CallRecord { called_at: now });
        Admission {
          admitted: true,
          just_locked: false,
        }
      }
    };

    if unlocked {
      self.state_changed(false);
    }
    if admission.just_locked {
      self.state_changed(true);
    }
    if !admission.admitted {
      debug!("Throttle refused call (limit {} per {})", self.limit, self.interval);
      if let Some(observer) = &self.observer {
        observer.on_throttle();
      }
    }

    admission
  }

  /// `true` when the call should be dropped.
  pub fn debounce(&self) -> bool {
    !self.check().admitted
  }

  /// Run a synchronous function through the throttle.
  ///
  /// The throttle stays locked while `f` runs, so overlapping callers are
  /// refused for its duration. Returns `None` when refused.
  pub fn try_run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
    if !self.check().admitted {
      return None;
    }
    let _hold = self.hold()?;
    Some(f())
  }

  /// Run an async operation through the throttle.
  ///
  /// Resolves `Ok(None)` when refused or already locked. Otherwise the
  /// throttle is locked until the operation settles (or the returned future
  /// is dropped), and the operation's own error is handed back after
  /// unlocking.
  pub async fn try_run_async<F, Fut, R>(&self, f: F) -> Result<Option<R>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
  {
    if !self.check().admitted {
      return Ok(None);
    }
    let Some(hold) = self.hold() else {
      return Ok(None);
    };

    let result = f().await;
    drop(hold);

    result.map(Some)
  }

  fn state(&self) -> MutexGuard<'_, ThrottleState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Lock the throttle for the lifetime of the returned guard.
  fn hold(&self) -> Option<Hold<'_>> {
    {
      let mut state = self.state();
      if state.locked {
        return None;
      }
      state.locked = true;
    }
    self.state_changed(true);

    Some(Hold { throttle: self })
  }

  fn release(&self) {
    let changed = {
      let mut state = self.state();
      std::mem::replace(&mut state.locked, false)
    };
    if changed {
      self.state_changed(false);
    }
  }

  fn state_changed(&self, locked: bool) {
    debug!("Throttle {}", if locked { "locked" } else { "unlocked" });
    if let Some(observer) = &self.observer {
      observer.on_state_change(locked);
    }
  }
}

impl std::fmt::Debug for Throttle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.state();
    f.debug_struct("Throttle")
      .field("limit", &self.limit)
      .field("interval", &self.interval)
      .field("locked", &state.locked)
      .field("in_flight", &state.ledger.len())
      .finish_non_exhaustive()
  }
}

/// Unlocks the throttle when dropped.
struct Hold<'a> {
  throttle: &'a Throttle,
}

impl Drop for Hold<'_> {
  fn drop(&mut self) {
    self.throttle.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Default)]
  struct Recorder {
    throttled: AtomicUsize,
    changes: Mutex<Vec<bool>>,
  }

  impl ThrottleObserver for Recorder {
    fn on_throttle(&self) {
      self.throttled.fetch_add(1, Ordering::SeqCst);
    }

    fn on_state_change(&self, locked: bool) {
      self.changes.lock().unwrap().push(locked);
    }
  }

  fn throttle(clock: &ManualClock) -> Throttle {
    Throttle::new(5, Duration::from_secs(10))
      .unwrap()
      .with_clock(clock.clone())
  }

  #[test]
  fn test_rejects_zero_limit_and_interval() {
    assert!(Throttle::new(0, Duration::from_secs(1)).is_err());
    assert!(Throttle::new(1, Duration::ZERO).is_err());
  }

  #[test]
  fn test_admits_limit_then_refuses() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    for _ in 0..5 {
      assert!(throttle.check().admitted);
    }
    let sixth = throttle.check();
    assert!(!sixth.admitted);
    assert!(sixth.just_locked);
    assert!(throttle.is_locked());

    clock.advance(chrono::Duration::milliseconds(10_001));
    assert!(throttle.check().admitted);
    assert!(!throttle.is_locked());
    assert_eq!(throttle.in_flight(), 1);
  }

  #[test]
  fn test_oldest_call_leaves_the_window() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    for _ in 0..5 {
      assert!(throttle.check().admitted);
      clock.advance(chrono::Duration::seconds(1));
    }

    // t = 10.5s: call 1 (t = 0) is out of the window, calls 2..5 remain.
    clock.set_millis(10_500);
    assert!(throttle.check().admitted);
    assert_eq!(throttle.in_flight(), 5);
  }

  #[test]
  fn test_stays_locked_until_ledger_empties() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    for _ in 0..5 {
      throttle.check();
      clock.advance(chrono::Duration::seconds(1));
    }
    assert!(throttle.debounce());
    assert!(throttle.is_locked());

    // Call 1 has aged out but four remain: still locked, nothing recorded.
    clock.set_millis(10_500);
    assert!(throttle.debounce());
    assert_eq!(throttle.in_flight(), 4);
    assert!(throttle.debounce());
    assert_eq!(throttle.in_flight(), 4);

    // Everything has aged out.
    clock.set_millis(14_500);
    assert!(!throttle.debounce());
    assert!(!throttle.is_locked());
    assert_eq!(throttle.in_flight(), 1);
  }

  #[test]
  fn test_observer_sees_refusals_and_transitions() {
    let clock = ManualClock::at_millis(0);
    let recorder = Arc::new(Recorder::default());
    let throttle = Throttle::new(1, Duration::from_secs(1))
      .unwrap()
      .with_clock(clock.clone())
      .with_observer(Arc::clone(&recorder));

    assert!(throttle.check().admitted);
    assert!(!throttle.check().admitted);
    assert!(!throttle.check().admitted);

    clock.advance(chrono::Duration::seconds(2));
    assert!(throttle.check().admitted);

    assert_eq!(recorder.throttled.load(Ordering::SeqCst), 2);
    assert_eq!(*recorder.changes.lock().unwrap(), vec![true, false]);
  }

  #[test]
  fn test_try_run_holds_lock_while_running() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    let result = throttle.try_run(|| {
      assert!(throttle.is_locked());
      // Overlapping callers are refused while the lock is held.
      assert!(throttle.try_run(|| ()).is_none());
      10 + 15
    });

    assert_eq!(result, Some(25));
    assert!(!throttle.is_locked());
  }

  #[test]
  fn test_try_run_unlocks_after_panic() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      throttle.try_run(|| panic!("inside throttled call"));
    }));

    assert!(outcome.is_err());
    assert!(!throttle.is_locked());
  }

  #[test]
  fn test_try_run_refused_after_limit() {
    let clock = ManualClock::at_millis(0);
    let throttle = Throttle::new(2, Duration::from_secs(10))
      .unwrap()
      .with_clock(clock.clone());

    assert_eq!(throttle.try_run(|| 1), Some(1));
    assert_eq!(throttle.try_run(|| 2), Some(2));
    assert_eq!(throttle.try_run(|| 3), None);
  }

  #[tokio::test]
  async fn test_try_run_async_returns_value() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    let value = throttle.try_run_async(|| async { Ok(42) }).await.unwrap();
    assert_eq!(value, Some(42));
    assert!(!throttle.is_locked());
  }

  #[tokio::test]
  async fn test_try_run_async_propagates_error_after_unlocking() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    let err = throttle
      .try_run_async(|| async { Err::<(), _>(eyre!("store unavailable")) })
      .await
      .unwrap_err();

    assert!(err.to_string().contains("store unavailable"));
    assert!(!throttle.is_locked());
  }

  #[tokio::test]
  async fn test_try_run_async_refused_while_in_flight() {
    let clock = ManualClock::at_millis(0);
    let throttle = throttle(&clock);

    let outer = throttle
      .try_run_async(|| async {
        let inner = throttle.try_run_async(|| async { Ok(1) }).await.unwrap();
        assert_eq!(inner, None);
        Ok(2)
      })
      .await
      .unwrap();

    assert_eq!(outer, Some(2));
  }

  #[tokio::test]
  async fn test_try_run_async_refused_when_throttled() {
    let clock = ManualClock::at_millis(0);
    let throttle = Throttle::new(1, Duration::from_secs(10))
      .unwrap()
      .with_clock(clock.clone());

    assert_eq!(throttle.try_run_async(|| async { Ok(1) }).await.unwrap(), Some(1));
    assert_eq!(throttle.try_run_async(|| async { Ok(2) }).await.unwrap(), None);
  }
}
