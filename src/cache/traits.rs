//! Result metadata returned alongside cached values.

use chrono::{DateTime, Utc};

/// Result from a cache read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the slot was last filled from the store
  pub refreshed_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  /// Data that was just fetched from the store.
  pub fn from_store(data: T, refreshed_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Store,
      refreshed_at,
    }
  }

  /// Data served from a slot that was still fresh.
  pub fn from_cache(data: T, refreshed_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      refreshed_at,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      refreshed_at: self.refreshed_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the store by this read
  Store,
  /// Served from the slot within its TTL
  Cache,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_map_keeps_metadata() {
    let at = DateTime::<Utc>::from_timestamp_millis(5_000).unwrap();
    let result = CacheResult::from_cache(Some(2), at).map(|n| n.unwrap_or(0) * 10);

    assert_eq!(result.data, 20);
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.refreshed_at, at);
  }
}
