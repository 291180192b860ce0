//! Shift tracker combining the TTL cache, the throttle and the reducer.

use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheSource, Store, TtlCache};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::records::{reduce_at, TimeSummary, Timeline};
use crate::throttle::Throttle;

/// Summaries of one member's current record.
///
/// Reads go through a [`TtlCache`] over the member's event path, so
/// repeated renders share one store read per TTL. User-triggered refreshes
/// bypass the TTL but are rate limited by a [`Throttle`].
pub struct ShiftTracker<S: Store> {
  cache: TtlCache<Value, S>,
  throttle: Throttle,
  clock: Arc<dyn Clock>,
}

impl<S: Store> ShiftTracker<S> {
  /// Create a tracker on the system clock. Must be called within a Tokio
  /// runtime.
  pub fn new(store: Arc<S>, events_path: impl Into<String>, config: &Config) -> Result<Self> {
    Self::with_clock(store, events_path, config, SystemClock)
  }

  pub fn with_clock<C: Clock + Clone + 'static>(
    store: Arc<S>,
    events_path: impl Into<String>,
    config: &Config,
    clock: C,
  ) -> Result<Self> {
    let cache = TtlCache::new(store, events_path, config.cache.ttl())?.with_clock(clock.clone());
    let throttle = Throttle::new(config.throttle.limit, config.throttle.interval())?
      .with_clock(clock.clone());

    Ok(Self {
      cache,
      throttle,
      clock: Arc::new(clock),
    })
  }

  /// Store path of a member's open record events.
  pub fn events_path(org: &str, member: &str) -> String {
    format!("orgs/{}/members/{}/currentRecord/events", org, member)
  }

  pub fn throttle(&self) -> &Throttle {
    &self.throttle
  }

  /// Summary of the cached events; a missing record reads as no events.
  pub async fn summary(&self) -> Result<TimeSummary> {
    let result = self
      .cache
      .read_detailed()
      .await?
      .map(|data| data.unwrap_or(Value::Null));
    if result.source == CacheSource::Store {
      info!("Fetched events from {}", self.cache.path());
    }

    let timeline = Timeline::from_value(&result.data)?;

    Ok(reduce_at(&timeline, self.clock.as_ref()))
  }

  /// Refetch and summarize, unless refreshes are being throttled.
  pub async fn refresh(&self) -> Result<Option<TimeSummary>> {
    let summary = self
      .throttle
      .try_run_async(|| async {
        self.cache.invalidate();
        self.summary().await
      })
      .await?;

    if summary.is_none() {
      info!("Refresh of {} throttled", self.cache.path());
    }
    Ok(summary)
  }
}
