//! Single-value TTL cache whose refills go through a serial queue.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::storage::Store;
use super::traits::CacheResult;
use crate::clock::{Clock, SystemClock};
use crate::queue::SerialQueue;

#[derive(Debug)]
struct CacheSlot<T> {
  value: Option<T>,
  /// `None` until the first successful fetch (or after `invalidate`).
  last_refreshed: Option<DateTime<Utc>>,
}

impl<T> CacheSlot<T> {
  fn fresh_since(&self, now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    self.last_refreshed.filter(|at| now - *at <= ttl)
  }
}

/// Caches the value stored at one path for `ttl`.
///
/// Every read is routed through a private [`SerialQueue`], so readers that
/// arrive while the slot is stale wait behind the one refill instead of
/// each hitting the store. A missing value is cached as `None` for the full
/// TTL as well. Failed fetches leave the slot untouched and fail the read.
pub struct TtlCache<T, S: Store> {
  store: Arc<S>,
  path: Arc<str>,
  ttl: Duration,
  slot: Arc<Mutex<CacheSlot<T>>>,
  queue: SerialQueue,
  clock: Arc<dyn Clock>,
}

impl<T, S> TtlCache<T, S>
where
  T: DeserializeOwned + Clone + Send + 'static,
  S: Store,
{
  /// Create a cache over `path`. Must be called within a Tokio runtime.
  pub fn new(store: Arc<S>, path: impl Into<String>, ttl: std::time::Duration) -> Result<Self> {
    if ttl.is_zero() {
      return Err(eyre!("Cache TTL must be greater than zero"));
    }
    let ttl = Duration::from_std(ttl).map_err(|e| eyre!("Cache TTL out of range: {}", e))?;

    Ok(Self {
      store,
      path: Arc::from(path.into()),
      ttl,
      slot: Arc::new(Mutex::new(CacheSlot {
        value: None,
        last_refreshed: None,
      })),
      queue: SerialQueue::new(),
      clock: Arc::new(SystemClock),
    })
  }

  /// Use a different time source.
  pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn ttl(&self) -> std::time::Duration {
    self.ttl.to_std().unwrap_or_default()
  }

  /// Read the cached value, refetching it first if the TTL has run out.
  pub async fn read(&self) -> Result<Option<T>> {
    Ok(self.read_detailed().await?.data)
  }

  /// Like [`read`](Self::read), but also reports whether the store was hit.
  pub async fn read_detailed(&self) -> Result<CacheResult<Option<T>>> {
    let store = Arc::clone(&self.store);
    let path = Arc::clone(&self.path);
    let slot = Arc::clone(&self.slot);
    let clock = Arc::clone(&self.clock);
    let ttl = self.ttl;

    self
      .queue
      .run(move || async move {
        let cached = {
          let slot = lock(&slot);
          slot
            .fresh_since(clock.now(), ttl)
            .map(|at| CacheResult::from_cache(slot.value.clone(), at))
        };
        if let Some(result) = cached {
          return Ok(result);
        }

        debug!("Cache for '{}' expired. Revalidating...", path);
        let snapshot = store.read(&path).await?;
        let value: Option<T> = snapshot.decode()?;

        let refreshed_at = clock.now();
        let mut slot = lock(&slot);
        slot.value = value.clone();
        slot.last_refreshed = Some(refreshed_at);

        Ok(CacheResult::from_store(value, refreshed_at))
      })
      .await
  }

  /// Currently cached value, without fetching or checking freshness.
  pub fn peek(&self) -> Option<T> {
    lock(&self.slot).value.clone()
  }

  /// Whether a read right now would be served without a fetch.
  pub fn is_fresh(&self) -> bool {
    lock(&self.slot)
      .fresh_since(self.clock.now(), self.ttl)
      .is_some()
  }

  /// Force the next read to refetch. The cached value stays visible to
  /// [`peek`](Self::peek) until then.
  pub fn invalidate(&self) {
    lock(&self.slot).last_refreshed = None;
  }
}

impl<T, S: Store> std::fmt::Debug for TtlCache<T, S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TtlCache")
      .field("path", &self.path)
      .field("ttl", &self.ttl)
      .field("queue", &self.queue)
      .finish_non_exhaustive()
  }
}

fn lock<T>(slot: &Mutex<CacheSlot<T>>) -> MutexGuard<'_, CacheSlot<T>> {
  slot.lock().unwrap_or_else(|e| e.into_inner())
}
