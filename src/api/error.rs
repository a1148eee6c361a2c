//! Error types surfaced by the API client and the request cache.

use std::time::Duration;

/// Errors a request can end in.
///
/// Cloneable so that every caller coalesced onto one in-flight request
/// receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  /// Rejected before or by input validation.
  #[error("{message}")]
  Validation { message: String },

  /// Missing, invalid or expired token.
  #[error("unauthenticated: {message}")]
  Unauthenticated { message: String },

  /// Daily quota or request rate exceeded.
  #[error("rate limited: {message}")]
  RateLimited {
    message: String,
    retry_after: Option<Duration>,
  },

  /// Resource does not exist (or is not visible to this user).
  #[error("not found: {resource}")]
  NotFound { resource: String },

  /// Any other 4xx response.
  #[error("request rejected (HTTP {status}): {message}")]
  Client { status: u16, message: String },

  /// 5xx response.
  #[error("server error (HTTP {status}): {message}")]
  Server { status: u16, message: String },

  /// Connection, DNS, TLS or timeout failure.
  #[error("network error: {message}")]
  Network { message: String },

  /// Body could not be encoded or decoded.
  #[error("invalid response: {message}")]
  Decode { message: String },

  /// Detached by a cache cancel or clear before its result was stored.
  #[error("request cancelled")]
  Cancelled,
}

impl ApiError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation {
      message: message.into(),
    }
  }

  /// Whether a failed read may be retried with backoff.
  ///
  /// Only transient failures qualify; anything the server answered with a
  /// 4xx status is final.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Server { .. } | Self::Network { .. })
  }

  /// HTTP status the error came from, if any.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Validation { .. } => None,
      Self::Unauthenticated { .. } => Some(401),
      Self::RateLimited { .. } => Some(429),
      Self::NotFound { .. } => Some(404),
      Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
      Self::Network { .. } | Self::Decode { .. } | Self::Cancelled => None,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      Self::Decode {
        message: err.to_string(),
      }
    } else {
      Self::Network {
        message: err.to_string(),
      }
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    Self::Decode {
      message: err.to_string(),
    }
  }
}

/// Result type for API and cache operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_transient_errors_are_retryable() {
    assert!(ApiError::Server {
      status: 503,
      message: "unavailable".into()
    }
    .is_retryable());
    assert!(ApiError::Network {
      message: "reset".into()
    }
    .is_retryable());

    assert!(!ApiError::Unauthenticated {
      message: "expired".into()
    }
    .is_retryable());
    assert!(!ApiError::RateLimited {
      message: "quota".into(),
      retry_after: None
    }
    .is_retryable());
    assert!(!ApiError::NotFound {
      resource: "dream".into()
    }
    .is_retryable());
    assert!(!ApiError::validation("too short").is_retryable());
    assert!(!ApiError::Cancelled.is_retryable());
  }

  #[test]
  fn test_status_codes() {
    assert_eq!(
      ApiError::Unauthenticated {
        message: String::new()
      }
      .status(),
      Some(401)
    );
    assert_eq!(
      ApiError::Client {
        status: 403,
        message: String::new()
      }
      .status(),
      Some(403)
    );
    assert_eq!(ApiError::validation("x").status(), None);
  }
}
