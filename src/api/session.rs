//! Bearer token storage and session-level events.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Shared holder for the current access token.
#[derive(Debug, Clone, Default)]
pub struct TokenStore(Arc<RwLock<Option<String>>>);

impl TokenStore {
  pub fn new(token: Option<String>) -> Self {
    let token = token.filter(|t| !t.trim().is_empty());
    Self(Arc::new(RwLock::new(token)))
  }

  /// Token from `DREAMBOOK_TOKEN`, if set.
  pub fn from_env() -> Self {
    Self::new(std::env::var("DREAMBOOK_TOKEN").ok())
  }

  pub fn get(&self) -> Option<String> {
    self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn set(&self, token: impl Into<String>) {
    *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    info!("access token stored");
  }

  /// Forget the token. Returns whether one was held.
  pub fn clear(&self) -> bool {
    let had = self.0.write().unwrap_or_else(PoisonError::into_inner).take().is_some();
    if had {
      info!("access token cleared");
    }
    had
  }

  pub fn is_authenticated(&self) -> bool {
    self.0.read().unwrap_or_else(PoisonError::into_inner).is_some()
  }
}

/// Session changes the client reports to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
  /// The server answered 401; the token has already been dropped.
  Unauthenticated,
}
