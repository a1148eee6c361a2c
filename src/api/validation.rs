//! Client-side input checks, run before anything reaches the network.

use super::error::{ApiError, ApiResult};

pub const MIN_DREAM_LENGTH: usize = 20;
pub const MAX_DREAM_LENGTH: usize = 4000;

/// Free accounts get one interpretation per day.
pub const FREE_DAILY_DREAMS: u32 = 1;

/// Search queries shorter than this are not sent.
pub const MIN_SEARCH_LENGTH: usize = 3;

/// Length of a dream text as the user sees it (Unicode scalar values).
pub fn dream_length(text: &str) -> usize {
  text.chars().count()
}

/// Validate a dream description.
pub fn validate_dream_text(text: &str) -> ApiResult<()> {
  if text.trim().is_empty() {
    return Err(ApiError::validation("Dream text is required"));
  }

  let len = dream_length(text);
  if len < MIN_DREAM_LENGTH {
    return Err(ApiError::validation(format!(
      "Dream must be at least {} characters",
      MIN_DREAM_LENGTH
    )));
  }
  if len > MAX_DREAM_LENGTH {
    return Err(ApiError::validation(format!(
      "Dream must not exceed {} characters",
      MAX_DREAM_LENGTH
    )));
  }

  Ok(())
}

/// Loose shape check: something@something.something, no whitespace.
pub fn validate_email(email: &str) -> ApiResult<()> {
  let invalid = || ApiError::validation("Enter a valid email address");

  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  if local.is_empty() || domain.contains('@') {
    return Err(invalid());
  }
  match domain.rsplit_once('.') {
    Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
    _ => Err(invalid()),
  }
}
