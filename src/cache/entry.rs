//! Cache entries and fetch results.

use serde_json::Value;
use std::time::{Duration, Instant};

/// Last known result for one request key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  /// Serialized value, decoded on read
  pub value: Value,
  /// When the value was stored
  pub updated_at: Instant,
  /// How long after `updated_at` the value stays fresh
  pub stale_after: Duration,
  /// Set by invalidation; cleared by the next write
  pub invalidated: bool,
  /// Bumped on every change so observers can tell when to re-read
  pub version: u64,
}

impl CacheEntry {
  /// A value is stale once its window has elapsed or it was invalidated.
  pub fn is_stale(&self) -> bool {
    self.invalidated || self.updated_at.elapsed() >= self.stale_after
  }

  pub fn is_fresh(&self) -> bool {
    !self.is_stale()
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<Instant>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from a fresh cache hit.
  pub fn from_cache(data: T, cached_at: Instant) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched (or joined an in-flight fetch) from the network
  Network,
  /// Served from a fresh cache entry without a network call
  Cache,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(stale_after: Duration) -> CacheEntry {
    CacheEntry {
      value: Value::Null,
      updated_at: Instant::now(),
      stale_after,
      invalidated: false,
      version: 1,
    }
  }

  #[test]
  fn test_zero_window_is_immediately_stale() {
    assert!(entry(Duration::ZERO).is_stale());
  }

  #[test]
  fn test_fresh_within_window() {
    assert!(entry(Duration::from_secs(60)).is_fresh());
  }

  #[test]
  fn test_invalidated_is_stale() {
    let mut e = entry(Duration::from_secs(60));
    e.invalidated = true;
    assert!(e.is_stale());
  }

  #[test]
  fn test_stale_after_window_elapses() {
    let e = entry(Duration::from_millis(5));
    std::thread::sleep(Duration::from_millis(10));
    assert!(e.is_stale());
  }
}
