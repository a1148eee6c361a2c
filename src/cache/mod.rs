//! Request cache shared by every read in the app.
//!
//! Results are keyed by [`RequestKey`] and kept in memory for the session:
//! - fresh entries are served without a network call
//! - stale entries stay readable while a refetch runs
//! - concurrent reads of one key share a single request
//! - entries can be invalidated or patched by prefix, and rolled back

mod entry;
mod key;
mod layer;
mod retry;
mod store;

pub use entry::{CacheEntry, CacheResult, CacheSource};
pub use key::{KeyPart, RequestKey};
pub use layer::{FetchHandle, FetchOptions, Interest};
pub use retry::RetryPolicy;
pub use store::{CacheConfig, RequestCache, Snapshot};
