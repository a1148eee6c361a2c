//! Cached reads bound to a view.
//!
//! A `Query<T>` owns one [`RequestKey`] and mirrors the cache entry for it:
//! it serves fresh data synchronously, shows stale data while a refetch runs,
//! and notices when someone else changes the entry.
//!
//! # Example
//!
//! ```ignore
//! let client = client.clone();
//! let mut query = Query::new(cache.clone(), DreamKeys::detail(&id), FetchOptions::new(FIVE_MIN), move || {
//!     let client = client.clone();
//!     let id = id.clone();
//!     async move { client.get_dream(&id).await }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiResult};
use crate::cache::{FetchOptions, Interest, RequestCache, RequestKey};

/// Where a query is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
  /// Not started, or disabled
  Idle,
  /// A request is running; earlier data may still be shown
  Loading,
  Success,
  /// The last request failed; earlier data is kept
  Error(ApiError),
}

type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;

struct Pending<T> {
  receiver: oneshot::Receiver<ApiResult<T>>,
  /// Dropping this withdraws the query's claim on the result
  _interest: Interest,
}

pub struct Query<T> {
  cache: RequestCache,
  key: RequestKey,
  options: FetchOptions,
  fetcher: FetcherFn<T>,
  status: QueryStatus,
  data: Option<T>,
  pending: Option<Pending<T>>,
  /// Entry version this query last reflected
  seen_version: Option<u64>,
  enabled: bool,
}

impl<T> Query<T>
where
  T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
  pub fn new<F, Fut>(cache: RequestCache, key: RequestKey, options: FetchOptions, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    Self {
      cache,
      key,
      options,
      fetcher: Arc::new(move || fetcher().boxed()),
      status: QueryStatus::Idle,
      data: None,
      pending: None,
      seen_version: None,
      enabled: true,
    }
  }

  /// A disabled query never fetches and stays idle.
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.pending = None;
      self.status = QueryStatus::Idle;
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn key(&self) -> &RequestKey {
    &self.key
  }

  pub fn status(&self) -> &QueryStatus {
    &self.status
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn error(&self) -> Option<&ApiError> {
    match &self.status {
      QueryStatus::Error(e) => Some(e),
      _ => None,
    }
  }

  /// True when there is no fresh cache entry behind the shown data.
  pub fn is_stale(&self) -> bool {
    self.cache.get(&self.key).map_or(true, |entry| entry.is_stale())
  }

  /// Load on mount: fresh data is applied immediately, anything else
  /// starts (or joins) a request.
  pub fn fetch(&mut self) {
    if !self.enabled || self.pending.is_some() {
      return;
    }

    if let Some(entry) = self.cache.get(&self.key) {
      let fresh = entry.is_fresh();
      match serde_json::from_value::<T>(entry.value) {
        Ok(data) => {
          self.data = Some(data);
          self.seen_version = Some(entry.version);
          if fresh {
            debug!(key = %self.key, "query served from cache");
            self.status = QueryStatus::Success;
            return;
          }
        }
        Err(e) => warn!(key = %self.key, error = %e, "cached value does not decode"),
      }
    }

    self.start_fetch();
  }

  /// Request again even if the cached data is fresh.
  pub fn refetch(&mut self) {
    if !self.enabled {
      return;
    }
    self.pending = None;
    self.start_fetch();
  }

  /// Point the query at another key. Any pending result for the old key is
  /// discarded.
  pub fn rebind<F, Fut>(&mut self, key: RequestKey, fetcher: F)
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    self.pending = None;
    self.key = key;
    self.fetcher = Arc::new(move || fetcher().boxed());
    self.data = None;
    self.seen_version = None;
    self.status = QueryStatus::Idle;
    self.fetch();
  }

  /// Pick up finished requests and outside changes to the cache entry.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    if let Some(pending) = &mut self.pending {
      return match pending.receiver.try_recv() {
        // the entry was patched or cleared under the request; the cache
        // holds the current truth
        Ok(Err(ApiError::Cancelled)) => {
          debug!(key = %self.key, "request cancelled, rereading cache");
          self.pending = None;
          self.sync_with_cache();
          true
        }
        Ok(result) => {
          self.pending = None;
          self.apply(result);
          true
        }
        Err(oneshot::error::TryRecvError::Empty) => self.adopt_while_loading(),
        Err(oneshot::error::TryRecvError::Closed) => {
          self.pending = None;
          self.status = QueryStatus::Error(ApiError::Network {
            message: "request was dropped".to_string(),
          });
          true
        }
      };
    }

    if !self.enabled {
      return false;
    }

    let version = self.cache.version(&self.key);
    if version == self.seen_version {
      return false;
    }
    self.sync_with_cache();
    true
  }

  /// Mirror the cache entry, refetching when it is gone or invalidated.
  fn sync_with_cache(&mut self) {
    let Some(entry) = self.cache.get(&self.key) else {
      debug!(key = %self.key, "query entry removed, refetching");
      self.seen_version = None;
      self.start_fetch();
      return;
    };

    self.seen_version = Some(entry.version);
    let invalidated = entry.invalidated;
    match serde_json::from_value::<T>(entry.value) {
      Ok(data) => {
        self.data = Some(data);
        self.status = QueryStatus::Success;
      }
      Err(e) => self.status = QueryStatus::Error(e.into()),
    }
    if invalidated {
      debug!(key = %self.key, "query invalidated, refetching");
      self.start_fetch();
    }
  }

  /// Show writes made to the entry while a request runs, such as an
  /// optimistic patch. The query stays loading.
  fn adopt_while_loading(&mut self) -> bool {
    if self.cache.version(&self.key) == self.seen_version {
      return false;
    }
    let Some(entry) = self.cache.get(&self.key) else {
      return false;
    };

    self.seen_version = Some(entry.version);
    match serde_json::from_value::<T>(entry.value) {
      Ok(data) => {
        self.data = Some(data);
        true
      }
      Err(e) => {
        warn!(key = %self.key, error = %e, "cached value does not decode");
        false
      }
    }
  }

  fn apply(&mut self, result: ApiResult<T>) {
    self.seen_version = self.cache.version(&self.key);
    match result {
      Ok(data) => {
        self.data = Some(data);
        self.status = QueryStatus::Success;
      }
      Err(e) => {
        debug!(key = %self.key, error = %e, "query failed");
        self.status = QueryStatus::Error(e);
      }
    }
  }

  fn start_fetch(&mut self) {
    let fetcher = Arc::clone(&self.fetcher);
    let handle = self
      .cache
      .begin_fetch::<T, _, _>(&self.key, &self.options, move || fetcher());
    let (result, interest) = handle.split();

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      // Ignore send errors - the query may have moved on
      let _ = tx.send(result.await);
    });

    self.pending = Some(Pending {
      receiver: rx,
      _interest: interest,
    });
    self.status = QueryStatus::Loading;
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("status", &self.status)
      .field("data", &self.data)
      .field("enabled", &self.enabled)
      .finish_non_exhaustive()
  }
}


#[cfg(test)]
mod tests {
  use super::test_support::poll_until;
  use super::*;
  use crate::cache::{CacheConfig, RetryPolicy};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  const MINUTE: Duration = Duration::from_secs(60);

  fn cache() -> RequestCache {
    RequestCache::new(CacheConfig {
      retry: RetryPolicy::none(),
      ..CacheConfig::default()
    })
  }

  fn key(name: &str) -> RequestKey {
    RequestKey::new("test").with(name)
  }

  fn counted(
    calls: &Arc<AtomicU32>,
    delay: Duration,
    result: ApiResult<i32>,
  ) -> impl Fn() -> BoxFuture<'static, ApiResult<i32>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      let result = result.clone();
      async move {
        tokio::time::sleep(delay).await;
        result
      }
      .boxed()
    }
  }

  fn offline() -> ApiError {
    ApiError::Network {
      message: "offline".into(),
    }
  }

  #[tokio::test]
  async fn test_fresh_cache_is_served_synchronously() {
    let cache = cache();
    cache.set(&key("a"), &7, MINUTE).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(cache, key("a"), FetchOptions::new(MINUTE), counted(&calls, Duration::ZERO, Ok(1)));
    query.fetch();

    assert!(!query.is_loading());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&7));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_miss_loads_and_populates_cache() {
    let cache = cache();
    let calls = Arc::new(AtomicU32::new(0));
    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(5), Ok(42)),
    );

    assert_eq!(query.status(), &QueryStatus::Idle);
    query.fetch();
    assert!(query.is_loading());
    assert!(query.data().is_none());

    poll_until(&mut query, |q| !q.is_loading()).await;
    assert_eq!(query.data(), Some(&42));
    assert_eq!(cache.get_as::<i32>(&key("a")).unwrap(), Some(42));
    assert!(!query.is_stale());
  }

  #[tokio::test]
  async fn test_stale_data_is_shown_while_loading() {
    let cache = cache();
    cache.set(&key("a"), &1, Duration::ZERO).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache,
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(20), Ok(2)),
    );
    query.fetch();

    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&1));

    poll_until(&mut query, |q| q.is_success()).await;
    assert_eq!(query.data(), Some(&2));
  }

  #[tokio::test]
  async fn test_error_keeps_previous_data() {
    let cache = cache();
    cache.set(&key("a"), &1, Duration::ZERO).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::ZERO, Err(offline())),
    );
    query.fetch();
    poll_until(&mut query, |q| q.error().is_some()).await;

    assert_eq!(query.error(), Some(&offline()));
    assert_eq!(query.data(), Some(&1));
    assert_eq!(cache.get_as::<i32>(&key("a")).unwrap(), Some(1));

    // no refetch loop after a failure
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!query.poll());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_outside_write_is_picked_up_without_network() {
    let cache = cache();
    cache.set(&key("a"), &1, MINUTE).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(cache.clone(), key("a"), FetchOptions::new(MINUTE), counted(&calls, Duration::ZERO, Ok(9)));
    query.fetch();
    assert!(!query.poll());

    cache.set(&key("a"), &5, MINUTE).unwrap();
    assert!(query.poll());
    assert_eq!(query.data(), Some(&5));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_invalidation_triggers_refetch() {
    let cache = cache();
    cache.set(&key("a"), &1, MINUTE).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(5), Ok(2)),
    );
    query.fetch();
    assert_eq!(query.data(), Some(&1));

    cache.invalidate(&RequestKey::new("test"));
    assert!(query.poll());
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&1));

    poll_until(&mut query, |q| q.is_success()).await;
    assert_eq!(query.data(), Some(&2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_write_during_request_is_shown_while_loading() {
    let cache = cache();
    cache.set(&key("a"), &1, Duration::ZERO).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(30), Ok(2)),
    );
    query.fetch();
    assert!(query.is_loading());
    assert!(!query.poll());

    cache.set(&key("a"), &5, Duration::ZERO).unwrap();
    assert!(query.poll());
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&5));

    poll_until(&mut query, |q| q.is_success()).await;
    assert_eq!(query.data(), Some(&2));
  }

  #[tokio::test]
  async fn test_cancelled_request_keeps_cached_data() {
    let cache = cache();
    cache.set(&key("a"), &1, Duration::ZERO).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(20), Ok(9)),
    );
    query.fetch();
    cache.cancel(&RequestKey::new("test"));
    cache.set(&key("a"), &4, Duration::ZERO).unwrap();

    poll_until(&mut query, |q| q.is_success()).await;
    assert_eq!(query.data(), Some(&4));
    assert_eq!(query.error(), None);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!query.poll());
    assert_eq!(query.data(), Some(&4));
    assert_eq!(cache.get_as::<i32>(&key("a")).unwrap(), Some(4));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_cancelled_request_refetches_cleared_entry() {
    let cache = cache();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(10), Ok(3)),
    );
    query.fetch();
    cache.clear();

    poll_until(&mut query, |q| q.is_success()).await;
    assert_eq!(query.data(), Some(&3));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get_as::<i32>(&key("a")).unwrap(), Some(3));
  }

  #[tokio::test]
  async fn test_two_queries_share_one_request() {
    let cache = cache();
    let calls = Arc::new(AtomicU32::new(0));
    let options = FetchOptions::new(MINUTE);

    let mut a = Query::new(cache.clone(), key("a"), options, counted(&calls, Duration::from_millis(10), Ok(3)));
    let mut b = Query::new(cache.clone(), key("a"), options, counted(&calls, Duration::from_millis(10), Ok(4)));
    a.fetch();
    b.fetch();

    poll_until(&mut a, |q| q.is_success()).await;
    poll_until(&mut b, |q| q.is_success()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data(), Some(&3));
    assert_eq!(b.data(), Some(&3));
  }

  #[tokio::test]
  async fn test_rebind_discards_pending_result() {
    let cache = cache();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("first"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(30), Ok(1)),
    );
    query.fetch();
    query.rebind(key("second"), counted(&calls, Duration::from_millis(5), Ok(2)));

    poll_until(&mut query, |q| q.is_success()).await;
    assert_eq!(query.data(), Some(&2));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!query.poll());
    assert_eq!(query.data(), Some(&2));
    assert!(cache.get(&key("first")).is_none());
  }

  #[tokio::test]
  async fn test_dropped_query_does_not_write() {
    let cache = cache();
    let calls = Arc::new(AtomicU32::new(0));

    let mut query = Query::new(
      cache.clone(),
      key("a"),
      FetchOptions::new(MINUTE),
      counted(&calls, Duration::from_millis(20), Ok(1)),
    );
    query.fetch();
    drop(query);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.get(&key("a")).is_none());
  }

  #[tokio::test]
  async fn test_disabled_query_stays_idle() {
    let cache = cache();
    let calls = Arc::new(AtomicU32::new(0));
    let mut query = Query::new(cache.clone(), key("a"), FetchOptions::new(MINUTE), counted(&calls, Duration::ZERO, Ok(1)))
      .with_enabled(false);

    query.fetch();
    query.refetch();
    cache.set(&key("a"), &3, MINUTE).unwrap();

    assert!(!query.poll());
    assert_eq!(query.status(), &QueryStatus::Idle);
    assert!(query.data().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }
}
