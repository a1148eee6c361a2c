//! Typed HTTP client for the interpretation service.

use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{ApiError, ApiResult};
use super::session::{SessionEvent, TokenStore};
use super::types::{
  AuthResponse, Dream, DreamUpdate, EmailAuthData, ErrorBody, InterpretRequest, InterpretResponse,
  ListParams, Page, ProfileUpdate, TelegramAuthData, TtsRequest, TtsResponse, User, Voice,
};
use super::validation::{validate_dream_text, validate_email};

const API_PREFIX: &str = "api/v1/";

/// HTTP client for the interpretation service.
///
/// Cheap to clone; clones share the connection pool and the token store.
#[derive(Debug, Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  tokens: TokenStore,
  events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl ApiClient {
  /// `base_url` is the service root; the `/api/v1` prefix is added here.
  pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> ApiResult<Self> {
    let mut url = Url::parse(base_url)
      .map_err(|e| ApiError::validation(format!("Invalid API url {}: {}", base_url, e)))?;
    let path = format!("{}/{}", url.path().trim_end_matches('/'), API_PREFIX);
    url.set_path(&path);

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("dreambook/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self {
      http,
      base_url: url,
      tokens,
      events: None,
    })
  }

  /// Report 401 answers on `events`.
  pub fn with_session_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
    self.events = Some(events);
    self
  }

  pub fn tokens(&self) -> &TokenStore {
    &self.tokens
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  // ==========================================================================
  // Dreams
  // ==========================================================================

  /// Interpret a dream. The text is validated before any network access.
  pub async fn interpret_dream(&self, request: &InterpretRequest) -> ApiResult<InterpretResponse> {
    validate_dream_text(&request.text)?;
    self.send_json(Method::POST, "dreams/interpret", &[], Some(request)).await
  }

  pub async fn list_dreams(&self, params: &ListParams) -> ApiResult<Page<Dream>> {
    let query: Vec<(String, String)> = params.to_pairs().into_iter().collect();
    self.send_json::<(), _>(Method::GET, "dreams", &query, None).await
  }

  pub async fn search_dreams(&self, term: &str) -> ApiResult<Page<Dream>> {
    let query = [("q".to_string(), term.to_string())];
    self.send_json::<(), _>(Method::GET, "dreams/search", &query, None).await
  }

  pub async fn get_dream(&self, id: &str) -> ApiResult<Dream> {
    self
      .send_json::<(), _>(Method::GET, &format!("dreams/{}", id), &[], None)
      .await
  }

  pub async fn update_dream(&self, id: &str, changes: &DreamUpdate) -> ApiResult<Dream> {
    if let Some(text) = &changes.text {
      validate_dream_text(text)?;
    }
    self
      .send_json(Method::PATCH, &format!("dreams/{}", id), &[], Some(changes))
      .await
  }

  pub async fn delete_dream(&self, id: &str) -> ApiResult<()> {
    self
      .send::<()>(Method::DELETE, &format!("dreams/{}", id), &[], None)
      .await?;
    Ok(())
  }

  pub async fn generate_narration(&self, id: &str, voice: Voice) -> ApiResult<TtsResponse> {
    let body = TtsRequest { voice };
    self
      .send_json(Method::POST, &format!("dreams/{}/tts", id), &[], Some(&body))
      .await
  }

  // ==========================================================================
  // Auth and users
  // ==========================================================================

  pub async fn login_telegram(&self, data: &TelegramAuthData) -> ApiResult<AuthResponse> {
    self.send_json(Method::POST, "auth/telegram", &[], Some(data)).await
  }

  pub async fn login_email(&self, data: &EmailAuthData) -> ApiResult<AuthResponse> {
    validate_email(&data.email)?;
    if data.password.is_empty() {
      return Err(ApiError::validation("Password is required"));
    }
    self.send_json(Method::POST, "auth/login", &[], Some(data)).await
  }

  pub async fn logout(&self) -> ApiResult<()> {
    self.send::<()>(Method::POST, "auth/logout", &[], None).await?;
    Ok(())
  }

  pub async fn current_user(&self) -> ApiResult<User> {
    self.send_json::<(), _>(Method::GET, "users/me", &[], None).await
  }

  pub async fn update_profile(&self, changes: &ProfileUpdate) -> ApiResult<User> {
    self.send_json(Method::PATCH, "users/me", &[], Some(changes)).await
  }

  // ==========================================================================
  // Transport
  // ==========================================================================

  fn endpoint(&self, path: &str) -> ApiResult<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::validation(format!("Invalid request path {}: {}", path, e)))
  }

  async fn send_json<B, T>(
    &self,
    method: Method,
    path: &str,
    query: &[(String, String)],
    body: Option<&B>,
  ) -> ApiResult<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let response = self.send(method, path, query, body).await?;
    let value: Value = response.json().await?;
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
      message: format!("unexpected response from {}: {}", path, e),
    })
  }

  /// Issue one request and map non-2xx answers to [`ApiError`].
  async fn send<B>(
    &self,
    method: Method,
    path: &str,
    query: &[(String, String)],
    body: Option<&B>,
  ) -> ApiResult<Response>
  where
    B: Serialize + ?Sized,
  {
    let url = self.endpoint(path)?;
    debug!(method = %method, url = %url, "api request");

    let mut request = self.http.request(method, url);
    if !query.is_empty() {
      request = request.query(query);
    }
    if let Some(token) = self.tokens.get() {
      request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    Err(self.error_for(path, response).await)
  }

  async fn error_for(&self, path: &str, response: Response) -> ApiError {
    let status = response.status();
    let retry_after = response
      .headers()
      .get(RETRY_AFTER)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.trim().parse::<u64>().ok())
      .map(Duration::from_secs);

    let body: Option<ErrorBody> = response
      .text()
      .await
      .ok()
      .and_then(|text| serde_json::from_str(&text).ok());
    let message = body
      .and_then(|b| b.message.or(b.error))
      .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    warn!(path, status = status.as_u16(), message = %message, "api request failed");

    match status {
      StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation { message },
      StatusCode::UNAUTHORIZED => {
        self.end_session();
        ApiError::Unauthenticated { message }
      }
      StatusCode::NOT_FOUND => ApiError::NotFound {
        resource: path.to_string(),
      },
      StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { message, retry_after },
      s if s.is_server_error() => ApiError::Server {
        status: s.as_u16(),
        message,
      },
      s => ApiError::Client {
        status: s.as_u16(),
        message,
      },
    }
  }

  fn end_session(&self) {
    self.tokens.clear();
    info!("session rejected by server");
    if let Some(events) = &self.events {
      // receiver gone means the app is shutting down
      let _ = events.send(SessionEvent::Unauthenticated);
    }
  }
}
