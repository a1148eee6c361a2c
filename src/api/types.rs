//! Wire and domain types for the interpretation API.
//!
//! The API speaks snake_case JSON, so most types deserialize directly.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{ApiError, ApiResult};

// ============================================================================
// Dreams
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dream {
  pub id: String,
  pub text: String,
  #[serde(default)]
  pub voice_url: Option<String>,
  #[serde(default = "default_language")]
  pub language: String,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub interpretation: Option<Interpretation>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub similar_dreams_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
  #[serde(default)]
  pub id: Option<String>,
  pub dream_id: String,
  pub main_symbol: String,
  #[serde(default)]
  pub main_symbol_emoji: Option<String>,
  pub interpretation: String,
  #[serde(default)]
  pub emotions: Vec<Emotion>,
  #[serde(default)]
  pub advice: Option<String>,
  #[serde(default)]
  pub ai_model: Option<String>,
  #[serde(default)]
  pub prompt_version: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub processing_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
  pub name: String,
  /// Free-form level reported by the model ("low", "medium", "high", or localized)
  pub intensity: String,
  #[serde(default)]
  pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarDream {
  pub id: String,
  pub text: String,
  #[serde(default)]
  pub main_symbol: Option<String>,
  pub similarity: f64,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretRequest {
  pub text: String,
  /// Base64 encoded audio
  #[serde(skip_serializing_if = "Option::is_none")]
  pub voice_data: Option<String>,
  pub language: String,
  pub include_similar: bool,
}

impl InterpretRequest {
  pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      voice_data: None,
      language: language.into(),
      include_similar: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretResponse {
  pub dream_id: String,
  pub interpretation: Interpretation,
  #[serde(default)]
  pub similar_dreams: Vec<SimilarDream>,
  pub daily_limit_remaining: i64,
  #[serde(default)]
  pub is_saved: bool,
}

impl InterpretResponse {
  /// Journal entry implied by a saved interpretation of `request`.
  pub fn to_dream(&self, request: &InterpretRequest) -> Dream {
    Dream {
      id: self.dream_id.clone(),
      text: request.text.clone(),
      voice_url: None,
      language: request.language.clone(),
      created_at: self.interpretation.created_at.unwrap_or_else(Utc::now),
      interpretation: Some(self.interpretation.clone()),
      tags: Vec::new(),
      similar_dreams_count: self.similar_dreams.len() as u32,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DreamUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_deleted: Option<bool>,
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub page: u32,
  pub limit: u32,
  pub pages: u32,
}

impl<T> Page<T> {
  /// Page number to request next, if any.
  pub fn next_page(&self) -> Option<u32> {
    (self.page < self.pages).then_some(self.page + 1)
  }

  pub fn prev_page(&self) -> Option<u32> {
    (self.page > 1).then(|| self.page - 1)
  }
}

impl Page<Dream> {
  /// Copy of this page with the dream `id` removed.
  pub fn without(mut self, id: &str) -> Self {
    let before = self.items.len();
    self.items.retain(|dream| dream.id != id);
    let removed = (before - self.items.len()) as u64;
    self.total = self.total.saturating_sub(removed);
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListParams {
  pub page: u32,
  pub limit: u32,
  pub search: Option<String>,
  pub tag: Option<String>,
}

impl Default for ListParams {
  fn default() -> Self {
    Self {
      page: 1,
      limit: 10,
      search: None,
      tag: None,
    }
  }
}

impl ListParams {
  pub fn with_page(mut self, page: u32) -> Self {
    self.page = page.max(1);
    self
  }

  pub fn with_search(mut self, search: Option<String>) -> Self {
    self.search = search.filter(|s| !s.trim().is_empty());
    self.page = 1;
    self
  }

  /// Parameters as ordered name/value pairs (query string and cache key).
  pub fn to_pairs(&self) -> BTreeMap<String, String> {
    let mut pairs = BTreeMap::new();
    pairs.insert("page".to_string(), self.page.to_string());
    pairs.insert("limit".to_string(), self.limit.to_string());
    if let Some(search) = &self.search {
      pairs.insert("search".to_string(), search.clone());
    }
    if let Some(tag) = &self.tag {
      pairs.insert("tag".to_string(), tag.clone());
    }
    pairs
  }
}

// ============================================================================
// Narration
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
  #[default]
  Nova,
  Alloy,
  Echo,
  Fable,
  Onyx,
  Shimmer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
  pub voice: Voice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsResponse {
  /// Base64 encoded audio
  pub audio: String,
  pub format: String,
  pub voice: String,
}

impl TtsResponse {
  pub fn decode_audio(&self) -> ApiResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
      .decode(self.audio.trim())
      .map_err(|e| ApiError::Decode {
        message: format!("narration audio is not valid base64: {}", e),
      })
  }
}

// ============================================================================
// Users and auth
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
  #[default]
  Free,
  Trial,
  Pro,
  Yearly,
}

impl SubscriptionType {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Free => "Free",
      Self::Trial => "Trial",
      Self::Pro => "Pro",
      Self::Yearly => "Pro (yearly)",
    }
  }

  pub fn is_unlimited(&self) -> bool {
    matches!(self, Self::Pro | Self::Yearly)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub telegram_id: Option<i64>,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default = "default_language")]
  pub language_code: String,
  #[serde(default)]
  pub timezone: Option<String>,
  #[serde(default)]
  pub subscription_type: SubscriptionType,
  #[serde(default)]
  pub daily_limit: Option<u32>,
  #[serde(default)]
  pub dreams_today: u32,
}

impl User {
  pub fn display_name(&self) -> String {
    match (&self.first_name, &self.last_name, &self.username) {
      (Some(first), Some(last), _) => format!("{} {}", first, last),
      (Some(first), None, _) => first.clone(),
      (None, _, Some(username)) => format!("@{}", username),
      _ => self.email.clone().unwrap_or_else(|| self.id.clone()),
    }
  }

  /// Interpretations left today; `None` means unlimited.
  pub fn remaining_today(&self) -> Option<u32> {
    if self.subscription_type.is_unlimited() {
      return None;
    }
    let limit = self
      .daily_limit
      .unwrap_or(super::validation::FREE_DAILY_DREAMS);
    Some(limit.saturating_sub(self.dreams_today))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(default)]
  pub token_type: Option<String>,
  #[serde(default)]
  pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
  pub user: User,
  pub tokens: AuthTokens,
  #[serde(default)]
  pub is_new_user: bool,
}

/// Payload produced by the chat platform's login widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramAuthData {
  pub id: i64,
  pub first_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photo_url: Option<String>,
  pub auth_date: i64,
  pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAuthData {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub language_code: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timezone: Option<String>,
}

/// Error body returned by the API on failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
  #[serde(default)]
  pub error: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub code: Option<String>,
}

fn default_language() -> String {
  "ru".to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
  use super::*;

  pub fn dream(id: &str) -> Dream {
    Dream {
      id: id.to_string(),
      text: format!("I was flying over a dark sea, dream {}", id),
      voice_url: None,
      language: "en".to_string(),
      created_at: "2026-01-02T03:04:05Z".parse().unwrap(),
      interpretation: None,
      tags: Vec::new(),
      similar_dreams_count: 0,
    }
  }

  pub fn page(ids: &[&str]) -> Page<Dream> {
    Page {
      items: ids.iter().map(|id| dream(id)).collect(),
      total: ids.len() as u64,
      page: 1,
      limit: 10,
      pages: 1,
    }
  }

  pub fn interpretation(dream_id: &str) -> Interpretation {
    Interpretation {
      id: Some(format!("interp-{}", dream_id)),
      dream_id: dream_id.to_string(),
      main_symbol: "Sea".to_string(),
      main_symbol_emoji: Some("🌊".to_string()),
      interpretation: "The sea stands for the unconscious.".to_string(),
      emotions: vec![Emotion {
        name: "awe".to_string(),
        intensity: "high".to_string(),
        meaning: "openness to change".to_string(),
      }],
      advice: Some("Write down what you felt on waking.".to_string()),
      ai_model: Some("gpt-4".to_string()),
      prompt_version: Some("v1.0".to_string()),
      created_at: Some("2026-01-02T03:04:06Z".parse().unwrap()),
      processing_time_ms: Some(1200),
    }
  }

  pub fn user() -> User {
    User {
      id: "user-1".to_string(),
      telegram_id: Some(42),
      username: Some("dreamer".to_string()),
      first_name: Some("Alex".to_string()),
      last_name: None,
      email: None,
      language_code: "en".to_string(),
      timezone: Some("UTC".to_string()),
      subscription_type: SubscriptionType::Free,
      daily_limit: Some(1),
      dreams_today: 0,
    }
  }
}
