//! Login, logout and the current user.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, warn};

use super::client::ApiClient;
use super::error::ApiResult;
use super::keys::AuthKeys;
use super::session::TokenStore;
use super::types::{AuthResponse, EmailAuthData, ProfileUpdate, TelegramAuthData, User};
use super::StaleTimes;
use crate::cache::{FetchOptions, RequestCache, RetryPolicy};
use crate::mutation::{Mutation, MutationHandler};
use crate::query::Query;

#[derive(Clone)]
pub struct AuthService {
  client: ApiClient,
  cache: RequestCache,
  stale: StaleTimes,
}

impl AuthService {
  pub fn new(client: ApiClient, cache: RequestCache, stale: StaleTimes) -> Self {
    Self { client, cache, stale }
  }

  pub fn tokens(&self) -> &TokenStore {
    self.client.tokens()
  }

  pub fn is_authenticated(&self) -> bool {
    self.client.tokens().is_authenticated()
  }

  /// The signed-in user. Never retried, and idle without a token.
  pub fn current_user(&self) -> Query<User> {
    let client = self.client.clone();
    Query::new(
      self.cache.clone(),
      AuthKeys::user(),
      FetchOptions::new(self.stale.user).with_retry(RetryPolicy::none()),
      move || {
        let client = client.clone();
        async move { client.current_user().await }
      },
    )
    .with_enabled(self.is_authenticated())
  }

  pub fn login(&self) -> Mutation<Login> {
    Mutation::new(
      self.cache.clone(),
      Login {
        client: self.client.clone(),
        stale: self.stale,
      },
    )
  }

  pub fn logout(&self) -> Mutation<Logout> {
    Mutation::new(
      self.cache.clone(),
      Logout {
        client: self.client.clone(),
      },
    )
  }

  pub fn update_profile(&self) -> Mutation<UpdateProfile> {
    Mutation::new(
      self.cache.clone(),
      UpdateProfile {
        client: self.client.clone(),
        stale: self.stale,
      },
    )
  }
}

/// Either login flow the service supports.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
  Telegram(TelegramAuthData),
  Email(EmailAuthData),
}

pub struct Login {
  client: ApiClient,
  stale: StaleTimes,
}

impl MutationHandler for Login {
  type Input = Credentials;
  type Output = AuthResponse;

  fn name(&self) -> &'static str {
    "login"
  }

  fn execute(&self, input: Credentials) -> BoxFuture<'static, ApiResult<AuthResponse>> {
    let client = self.client.clone();
    async move {
      match &input {
        Credentials::Telegram(data) => client.login_telegram(data).await,
        Credentials::Email(data) => client.login_email(data).await,
      }
    }
    .boxed()
  }

  fn on_success(&self, cache: &RequestCache, _input: &Credentials, output: &AuthResponse) {
    self.client.tokens().set(output.tokens.access_token.clone());
    if let Err(e) = cache.set(&AuthKeys::user(), &output.user, self.stale.user) {
      warn!(error = %e, "could not seed signed-in user");
    }
    info!(user_id = %output.user.id, new_user = output.is_new_user, "signed in");
  }
}

/// Ends the session locally whatever the server says.
pub struct Logout {
  client: ApiClient,
}

impl MutationHandler for Logout {
  type Input = ();
  type Output = ();

  fn name(&self) -> &'static str {
    "logout"
  }

  fn execute(&self, _input: ()) -> BoxFuture<'static, ApiResult<()>> {
    let client = self.client.clone();
    async move { client.logout().await }.boxed()
  }

  fn on_settled(&self, cache: &RequestCache, _input: &()) {
    self.client.tokens().clear();
    cache.clear();
    info!("signed out");
  }
}

pub struct UpdateProfile {
  client: ApiClient,
  stale: StaleTimes,
}

impl MutationHandler for UpdateProfile {
  type Input = ProfileUpdate;
  type Output = User;

  fn name(&self) -> &'static str {
    "update_profile"
  }

  fn execute(&self, input: ProfileUpdate) -> BoxFuture<'static, ApiResult<User>> {
    let client = self.client.clone();
    async move { client.update_profile(&input).await }.boxed()
  }

  fn on_success(&self, cache: &RequestCache, _input: &ProfileUpdate, output: &User) {
    if let Err(e) = cache.set(&AuthKeys::user(), output, self.stale.user) {
      warn!(error = %e, "could not store updated profile");
    }
  }
}
