//! Fetch orchestration on top of [`RequestCache`]: freshness checks,
//! request coalescing and write-back.

use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::entry::CacheResult;
use super::key::RequestKey;
use super::retry::RetryPolicy;
use super::store::{InFlight, RequestCache, SharedFetch};
use crate::api::{ApiError, ApiResult};

/// Per-read settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
  pub stale_after: Duration,
  /// Falls back to the cache-wide policy when unset
  pub retry: Option<RetryPolicy>,
}

impl FetchOptions {
  pub fn new(stale_after: Duration) -> Self {
    Self {
      stale_after,
      retry: None,
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = Some(retry);
    self
  }
}

/// A caller still waiting on an in-flight request.
///
/// Dropping it withdraws interest. A request that finishes with no interested
/// callers left is not written to the cache.
#[derive(Debug)]
pub struct Interest(Arc<AtomicUsize>);

impl Interest {
  fn register(counter: &Arc<AtomicUsize>) -> Self {
    counter.fetch_add(1, Ordering::SeqCst);
    Self(Arc::clone(counter))
  }
}

impl Drop for Interest {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

/// Handle on a started or joined request.
pub struct FetchHandle<T> {
  future: SharedFetch,
  interest: Interest,
  joined: bool,
  _marker: PhantomData<fn() -> T>,
}

impl<T> FetchHandle<T>
where
  T: DeserializeOwned + Send + 'static,
{
  /// True if this handle joined a request that was already running.
  pub fn joined(&self) -> bool {
    self.joined
  }

  pub async fn wait(self) -> ApiResult<T> {
    let (future, _interest) = self.split();
    future.await
  }

  /// Separate the result future from the interest guard, so the result can be
  /// driven on another task while the owner keeps the guard.
  pub fn split(self) -> (impl Future<Output = ApiResult<T>> + Send + 'static, Interest) {
    let FetchHandle { future, interest, .. } = self;
    let result = async move {
      let value = future.await?;
      serde_json::from_value(value).map_err(ApiError::from)
    };
    (result, interest)
  }
}

impl RequestCache {
  /// Start a request for `key`, or join the one already running.
  ///
  /// At most one request per key is in flight. The request runs on its own
  /// task, so it completes even if every handle is dropped; its result is then
  /// discarded. A request detached by `cancel` or `clear` still counts: a new
  /// caller waits for it to finish, then starts its own.
  pub fn begin_fetch<T, F, Fut>(&self, key: &RequestKey, options: &FetchOptions, fetcher: F) -> FetchHandle<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let mut state = self.lock();

    let previous = match state.in_flight.get(key) {
      Some(flight) if !flight.discarded => {
        debug!(key = %key, "joining in-flight request");
        return FetchHandle {
          future: flight.future.clone(),
          interest: Interest::register(&flight.interest),
          joined: true,
          _marker: PhantomData,
        };
      }
      Some(flight) => Some(flight.future.clone()),
      None => None,
    };

    state.next_fetch_id += 1;
    let id = state.next_fetch_id;
    let interest = Arc::new(AtomicUsize::new(0));
    let handle_interest = Interest::register(&interest);

    let retry = options.retry.unwrap_or(self.config.retry);
    let stale_after = options.stale_after;
    let cache = self.clone();
    let flight_key = key.clone();
    let flight_interest = Arc::clone(&interest);

    let future: SharedFetch = async move {
      if let Some(previous) = previous {
        debug!(key = %flight_key, "waiting for cancelled request to finish");
        let _ = previous.await;
      }
      debug!(key = %flight_key, "fetching");
      let result = retry
        .run(|| fetcher())
        .await
        .and_then(|data| serde_json::to_value(data).map_err(ApiError::from));
      if cache.complete_fetch(&flight_key, id, stale_after, &flight_interest, &result) {
        result
      } else {
        Err(ApiError::Cancelled)
      }
    }
    .boxed()
    .shared();

    state.in_flight.insert(
      key.clone(),
      InFlight {
        id,
        future: future.clone(),
        interest,
        discarded: false,
      },
    );
    drop(state);

    tokio::spawn(future.clone().map(|_| ()));

    FetchHandle {
      future,
      interest: handle_interest,
      joined: false,
      _marker: PhantomData,
    }
  }

  /// Retire the flight and store its result. Returns false if the flight was
  /// cancelled, in which case nothing is written.
  fn complete_fetch(
    &self,
    key: &RequestKey,
    id: u64,
    stale_after: Duration,
    interest: &AtomicUsize,
    result: &ApiResult<Value>,
  ) -> bool {
    let mut state = self.lock();

    let flight = state.in_flight.get(key).map(|flight| (flight.id, flight.discarded));
    let live = match flight {
      Some((current, discarded)) if current == id => {
        state.in_flight.remove(key);
        !discarded
      }
      // only a cancelled flight gets replaced
      _ => false,
    };
    if !live {
      debug!(key = %key, "request was cancelled, result dropped");
      return false;
    }

    match result {
      Ok(value) if interest.load(Ordering::SeqCst) > 0 => {
        state.write(key.clone(), value.clone(), stale_after);
      }
      Ok(_) => debug!(key = %key, "no callers left, result not cached"),
      Err(e) => warn!(key = %key, error = %e, "request failed, cached value kept"),
    }
    true
  }

  /// Cache-first read.
  ///
  /// A fresh entry is returned without a network call. Otherwise the request
  /// runs (or is joined) and its result is stored. On failure the stale entry
  /// stays in place and the error is returned.
  pub async fn fetch<T, F, Fut>(
    &self,
    key: &RequestKey,
    options: &FetchOptions,
    fetcher: F,
  ) -> ApiResult<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    if let Some(entry) = self.get(key) {
      if entry.is_fresh() {
        debug!(key = %key, "cache hit");
        let data = serde_json::from_value(entry.value)?;
        return Ok(CacheResult::from_cache(data, entry.updated_at));
      }
    }

    let data = self.begin_fetch(key, options, fetcher).wait().await?;
    Ok(CacheResult::from_network(data))
  }
}
