//! Toast notifications and routing of API errors to the right surface.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::api::ApiError;
use crate::navigation::{LoginReason, LoginRedirect};

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Error,
  Warning,
  Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
  pub id: u64,
  pub kind: ToastKind,
  pub message: String,
  pub created_at: Instant,
  pub duration: Duration,
}

impl Toast {
  pub fn is_expired(&self) -> bool {
    self.created_at.elapsed() >= self.duration
  }
}

/// Queue of visible toasts, oldest first.
#[derive(Debug, Default)]
pub struct Toasts {
  items: Vec<Toast>,
  next_id: u64,
}

impl Toasts {
  pub fn push(&mut self, kind: ToastKind, message: impl Into<String>) -> u64 {
    self.push_for(kind, message, DEFAULT_TOAST_DURATION)
  }

  pub fn push_for(&mut self, kind: ToastKind, message: impl Into<String>, duration: Duration) -> u64 {
    self.next_id += 1;
    let toast = Toast {
      id: self.next_id,
      kind,
      message: message.into(),
      created_at: Instant::now(),
      duration,
    };
    debug!(kind = ?toast.kind, message = %toast.message, "toast");
    self.items.push(toast);
    self.next_id
  }

  pub fn dismiss(&mut self, id: u64) -> bool {
    let before = self.items.len();
    self.items.retain(|t| t.id != id);
    self.items.len() != before
  }

  /// Dismiss the newest toast.
  pub fn dismiss_latest(&mut self) -> bool {
    self.items.pop().is_some()
  }

  /// Drop expired toasts; returns whether anything changed.
  pub fn expire(&mut self) -> bool {
    let before = self.items.len();
    self.items.retain(|t| !t.is_expired());
    self.items.len() != before
  }

  pub fn items(&self) -> &[Toast] {
    &self.items
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// Where an error should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorRoute {
  /// Send the user to login
  Redirect(LoginRedirect),
  Notify(ToastKind, String),
  /// Show next to the form field that caused it
  Inline(String),
  /// Nothing to show
  Silent,
}

pub fn route_error(error: &ApiError, return_to: &str) -> ErrorRoute {
  match error {
    ApiError::Validation { message } => ErrorRoute::Inline(message.clone()),
    ApiError::Unauthenticated { .. } => {
      ErrorRoute::Redirect(LoginRedirect::new(LoginReason::SessionExpired, return_to))
    }
    ApiError::RateLimited { message, retry_after } => {
      let text = match retry_after {
        Some(after) => format!("{} Try again in {}.", message, human_duration(*after)),
        None => message.clone(),
      };
      ErrorRoute::Notify(ToastKind::Warning, text)
    }
    ApiError::NotFound { .. } => ErrorRoute::Notify(ToastKind::Error, "Not found".to_string()),
    ApiError::Cancelled => ErrorRoute::Silent,
    other => ErrorRoute::Notify(ToastKind::Error, other.to_string()),
  }
}

fn human_duration(d: Duration) -> String {
  let secs = d.as_secs();
  if secs >= 3600 {
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
  } else if secs >= 60 {
    format!("{}m", secs.div_ceil(60))
  } else {
    format!("{}s", secs)
  }
}

/// Shared handle views use to raise toasts.
#[derive(Debug, Clone, Default)]
pub struct Notifier(Arc<Mutex<Toasts>>);

impl Notifier {
  pub fn push(&self, kind: ToastKind, message: impl Into<String>) -> u64 {
    self.lock().push(kind, message)
  }

  pub fn success(&self, message: impl Into<String>) -> u64 {
    self.push(ToastKind::Success, message)
  }

  pub fn info(&self, message: impl Into<String>) -> u64 {
    self.push(ToastKind::Info, message)
  }

  /// Raise a toast for errors that route to one. Redirects are left to the
  /// session event and inline errors to the view.
  pub fn report(&self, error: &ApiError) -> ErrorRoute {
    let route = route_error(error, "/");
    if let ErrorRoute::Notify(kind, message) = &route {
      self.push(*kind, message.clone());
    }
    route
  }

  pub fn dismiss_latest(&self) -> bool {
    self.lock().dismiss_latest()
  }

  pub fn expire(&self) -> bool {
    self.lock().expire()
  }

  pub fn snapshot(&self) -> Vec<Toast> {
    self.lock().items().to_vec()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Toasts> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
