//! Remote interpretation service: HTTP client, wire types and the
//! cache-aware services built on top of them.

pub mod auth;
mod client;
pub mod dreams;
mod error;
pub mod keys;
mod session;
pub mod types;
pub mod validation;

pub use auth::AuthService;
pub use client::ApiClient;
pub use dreams::DreamService;
pub use error::{ApiError, ApiResult};
pub use keys::{AuthKeys, DreamKeys};
pub use session::{SessionEvent, TokenStore};

#[cfg(test)]
pub(crate) use client::test_support;

use std::time::Duration;

/// How long each family of reads stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleTimes {
  pub list: Duration,
  pub detail: Duration,
  pub search: Duration,
  pub user: Duration,
}

impl Default for StaleTimes {
  fn default() -> Self {
    Self {
      list: Duration::from_secs(2 * 60),
      detail: Duration::from_secs(5 * 60),
      search: Duration::from_secs(60),
      user: Duration::from_secs(5 * 60),
    }
  }
}
