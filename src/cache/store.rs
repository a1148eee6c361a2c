//! In-memory request cache: entries, invalidation, snapshots and GC.

use futures::future::{BoxFuture, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use super::key::RequestKey;
use super::retry::RetryPolicy;
use crate::api::ApiResult;

/// Tuning for a [`RequestCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
  /// Stale window for reads that don't specify one
  pub default_stale: Duration,
  /// Idle entries older than this are dropped by `collect_garbage`
  pub gc_time: Duration,
  /// Retry policy for reads that don't specify one
  pub retry: RetryPolicy,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_stale: Duration::from_secs(60),
      gc_time: Duration::from_secs(5 * 60),
      retry: RetryPolicy::default(),
    }
  }
}

pub(super) type SharedFetch = Shared<BoxFuture<'static, ApiResult<Value>>>;

pub(super) struct Slot {
  pub entry: CacheEntry,
  pub last_accessed: Instant,
}

/// The single outstanding request for a key.
pub(super) struct InFlight {
  pub id: u64,
  pub future: SharedFetch,
  /// Callers still waiting for the result
  pub interest: Arc<AtomicUsize>,
  /// Set by `cancel`/`clear`: the request still runs, but its result is
  /// dropped and later callers queue behind it.
  pub discarded: bool,
}

#[derive(Default)]
pub(super) struct CacheState {
  pub entries: HashMap<RequestKey, Slot>,
  pub in_flight: HashMap<RequestKey, InFlight>,
  pub next_version: u64,
  pub next_fetch_id: u64,
}

impl CacheState {
  pub fn bump_version(&mut self) -> u64 {
    self.next_version += 1;
    self.next_version
  }

  pub fn write(&mut self, key: RequestKey, value: Value, stale_after: Duration) {
    let version = self.bump_version();
    let now = Instant::now();
    self.entries.insert(
      key,
      Slot {
        entry: CacheEntry {
          value,
          updated_at: now,
          stale_after,
          invalidated: false,
          version,
        },
        last_accessed: now,
      },
    );
  }
}

/// Saved cache entries, restored verbatim on rollback.
///
/// `None` records that the key had no entry, so restoring removes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
  entries: Vec<(RequestKey, Option<CacheEntry>)>,
}

impl Snapshot {
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Merge another snapshot into this one.
  pub fn extend(&mut self, other: Snapshot) {
    self.entries.extend(other.entries);
  }
}

/// Keyed store of previously fetched results.
///
/// Cloning is cheap and shares the underlying state; one instance lives for
/// one user session and is cleared on logout.
#[derive(Clone)]
pub struct RequestCache {
  pub(super) state: Arc<Mutex<CacheState>>,
  pub(super) config: CacheConfig,
}

impl RequestCache {
  pub fn new(config: CacheConfig) -> Self {
    Self {
      state: Arc::new(Mutex::new(CacheState::default())),
      config,
    }
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  /// The lock is never held across an await, so a poisoned state is still consistent.
  pub(super) fn lock(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Look up an entry. Never touches the network.
  pub fn get(&self, key: &RequestKey) -> Option<CacheEntry> {
    let mut state = self.lock();
    state.entries.get_mut(key).map(|slot| {
      slot.last_accessed = Instant::now();
      slot.entry.clone()
    })
  }

  /// Typed lookup.
  pub fn get_as<T: DeserializeOwned>(&self, key: &RequestKey) -> ApiResult<Option<T>> {
    match self.get(key) {
      Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
      None => Ok(None),
    }
  }

  /// Store or overwrite an entry, resetting its timestamp.
  pub fn set<T: Serialize>(&self, key: &RequestKey, value: &T, stale_after: Duration) -> ApiResult<()> {
    let value = serde_json::to_value(value)?;
    self.set_value(key, value, stale_after);
    Ok(())
  }

  pub fn set_value(&self, key: &RequestKey, value: Value, stale_after: Duration) {
    debug!(key = %key, "cache set");
    self.lock().write(key.clone(), value, stale_after);
  }

  /// Mark every entry under `prefix` stale. Returns how many matched.
  ///
  /// Nothing is refetched here; observers see the version change and the
  /// next read goes to the network.
  pub fn invalidate(&self, prefix: &RequestKey) -> usize {
    let mut state = self.lock();
    let CacheState {
      entries,
      next_version,
      ..
    } = &mut *state;

    let mut count = 0;
    for (key, slot) in entries.iter_mut() {
      if key.starts_with(prefix) {
        *next_version += 1;
        slot.entry.invalidated = true;
        slot.entry.version = *next_version;
        count += 1;
      }
    }
    debug!(prefix = %prefix, count, "cache invalidate");
    count
  }

  /// Purge one entry.
  pub fn remove(&self, key: &RequestKey) -> Option<CacheEntry> {
    self.lock().entries.remove(key).map(|slot| slot.entry)
  }

  /// Purge every entry under `prefix`.
  pub fn remove_matching(&self, prefix: &RequestKey) -> usize {
    let mut state = self.lock();
    let before = state.entries.len();
    state.entries.retain(|key, _| !key.starts_with(prefix));
    before - state.entries.len()
  }

  /// Detach in-flight requests under `prefix`. They run to completion but
  /// their results are not written, and their callers see
  /// [`ApiError::Cancelled`](crate::api::ApiError::Cancelled).
  pub fn cancel(&self, prefix: &RequestKey) -> usize {
    let mut state = self.lock();
    let mut detached = 0;
    for (key, flight) in state.in_flight.iter_mut() {
      if key.starts_with(prefix) && !flight.discarded {
        flight.discarded = true;
        detached += 1;
      }
    }
    detached
  }

  /// Drop every entry and detach every in-flight request. Used at session
  /// teardown.
  pub fn clear(&self) {
    let mut state = self.lock();
    let entries = state.entries.len();
    state.entries.clear();
    for flight in state.in_flight.values_mut() {
      flight.discarded = true;
    }
    info!(entries, "request cache cleared");
  }

  /// Remove entries that nobody has read or written for `gc_time`.
  pub fn collect_garbage(&self) -> usize {
    let gc_time = self.config.gc_time;
    let mut state = self.lock();
    let CacheState {
      entries, in_flight, ..
    } = &mut *state;

    let before = entries.len();
    entries.retain(|key, slot| in_flight.contains_key(key) || slot.last_accessed.elapsed() < gc_time);
    let removed = before - entries.len();
    if removed > 0 {
      debug!(removed, "cache garbage collected");
    }
    removed
  }

  /// Change counter for `key`; also marks the entry as in use.
  pub fn version(&self, key: &RequestKey) -> Option<u64> {
    let mut state = self.lock();
    state.entries.get_mut(key).map(|slot| {
      slot.last_accessed = Instant::now();
      slot.entry.version
    })
  }

  pub fn is_fetching(&self, key: &RequestKey) -> bool {
    self.lock().in_flight.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Capture every entry under `prefix`.
  pub fn snapshot(&self, prefix: &RequestKey) -> Snapshot {
    let state = self.lock();
    let entries = state
      .entries
      .iter()
      .filter(|(key, _)| key.starts_with(prefix))
      .map(|(key, slot)| (key.clone(), Some(slot.entry.clone())))
      .collect();
    Snapshot { entries }
  }

  /// Capture exactly one key, recording its absence if missing.
  pub fn snapshot_key(&self, key: &RequestKey) -> Snapshot {
    let state = self.lock();
    let entry = state.entries.get(key).map(|slot| slot.entry.clone());
    Snapshot {
      entries: vec![(key.clone(), entry)],
    }
  }

  /// Put back the captured entries.
  ///
  /// Value, timestamp, window and invalidation flag come back as captured;
  /// only the version moves forward so observers re-read.
  pub fn restore(&self, snapshot: Snapshot) {
    let mut state = self.lock();
    for (key, entry) in snapshot.entries {
      match entry {
        Some(mut entry) => {
          entry.version = state.bump_version();
          state.entries.insert(
            key,
            Slot {
              entry,
              last_accessed: Instant::now(),
            },
          );
        }
        None => {
          state.entries.remove(&key);
        }
      }
    }
  }

  /// Rewrite every entry under `prefix` with `f`, returning the prior state
  /// of the entries that were rewritten.
  ///
  /// Entries that do not decode as `T` are left as they are.
  pub fn update_matching<T, F>(&self, prefix: &RequestKey, mut f: F) -> ApiResult<Snapshot>
  where
    T: Serialize + DeserializeOwned,
    F: FnMut(T) -> T,
  {
    let mut state = self.lock();

    let mut updates = Vec::new();
    let mut saved = Vec::new();
    for (key, slot) in state.entries.iter().filter(|(key, _)| key.starts_with(prefix)) {
      let current: T = match serde_json::from_value(slot.entry.value.clone()) {
        Ok(current) => current,
        Err(e) => {
          warn!(key = %key, error = %e, "cached entry does not decode, left as is");
          continue;
        }
      };
      let patched = serde_json::to_value(f(current))?;
      updates.push((key.clone(), patched));
      saved.push((key.clone(), Some(slot.entry.clone())));
    }

    for (key, value) in updates {
      let version = state.bump_version();
      if let Some(slot) = state.entries.get_mut(&key) {
        slot.entry.value = value;
        slot.entry.version = version;
        slot.last_accessed = Instant::now();
      }
    }

    debug!(prefix = %prefix, count = saved.len(), "cache patched");
    Ok(Snapshot { entries: saved })
  }
}

impl Default for RequestCache {
  fn default() -> Self {
    Self::new(CacheConfig::default())
  }
}
