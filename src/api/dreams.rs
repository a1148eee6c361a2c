//! Dream reads and writes with their cache effects.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, warn};

use super::client::ApiClient;
use super::error::ApiResult;
use super::keys::DreamKeys;
use super::types::{Dream, DreamUpdate, InterpretRequest, InterpretResponse, ListParams, Page, TtsResponse, Voice};
use super::validation::MIN_SEARCH_LENGTH;
use super::StaleTimes;
use crate::cache::{FetchOptions, RequestCache, Snapshot};
use crate::mutation::{Mutation, MutationHandler};
use crate::query::Query;

/// Entry point for everything dream-related the views need.
#[derive(Clone)]
pub struct DreamService {
  client: ApiClient,
  cache: RequestCache,
  stale: StaleTimes,
}

impl DreamService {
  pub fn new(client: ApiClient, cache: RequestCache, stale: StaleTimes) -> Self {
    Self { client, cache, stale }
  }

  pub fn cache(&self) -> &RequestCache {
    &self.cache
  }

  // ==========================================================================
  // Queries
  // ==========================================================================

  pub fn list(&self, params: ListParams) -> Query<Page<Dream>> {
    let key = DreamKeys::list(&params);
    Query::new(
      self.cache.clone(),
      key,
      FetchOptions::new(self.stale.list),
      list_fetcher(self.client.clone(), params),
    )
  }

  /// Move a list query to other parameters (paging, search).
  pub fn rebind_list(&self, query: &mut Query<Page<Dream>>, params: ListParams) {
    let key = DreamKeys::list(&params);
    query.rebind(key, list_fetcher(self.client.clone(), params));
  }

  /// Disabled until there is an id.
  pub fn detail(&self, id: Option<String>) -> Query<Dream> {
    let enabled = id.is_some();
    let id = id.unwrap_or_default();
    let client = self.client.clone();
    Query::new(
      self.cache.clone(),
      DreamKeys::detail(&id),
      FetchOptions::new(self.stale.detail),
      move || {
        let client = client.clone();
        let id = id.clone();
        async move { client.get_dream(&id).await }
      },
    )
    .with_enabled(enabled)
  }

  /// Disabled for terms shorter than the minimum search length.
  pub fn search(&self, term: &str) -> Query<Page<Dream>> {
    let term = term.trim().to_string();
    let enabled = term.chars().count() >= MIN_SEARCH_LENGTH;
    let client = self.client.clone();
    Query::new(
      self.cache.clone(),
      DreamKeys::search(&term),
      FetchOptions::new(self.stale.search),
      move || {
        let client = client.clone();
        let term = term.clone();
        async move { client.search_dreams(&term).await }
      },
    )
    .with_enabled(enabled)
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  pub fn interpret(&self) -> Mutation<InterpretDream> {
    Mutation::new(
      self.cache.clone(),
      InterpretDream {
        client: self.client.clone(),
        stale: self.stale,
      },
    )
  }

  pub fn update(&self) -> Mutation<UpdateDream> {
    Mutation::new(
      self.cache.clone(),
      UpdateDream {
        client: self.client.clone(),
      },
    )
  }

  pub fn delete(&self) -> Mutation<DeleteDream> {
    Mutation::new(
      self.cache.clone(),
      DeleteDream {
        client: self.client.clone(),
      },
    )
  }

  pub fn narrate(&self) -> Mutation<GenerateNarration> {
    Mutation::new(
      self.cache.clone(),
      GenerateNarration {
        client: self.client.clone(),
      },
    )
  }
}

fn list_fetcher(
  client: ApiClient,
  params: ListParams,
) -> impl Fn() -> BoxFuture<'static, ApiResult<Page<Dream>>> + Send + Sync + 'static {
  move || {
    let client = client.clone();
    let params = params.clone();
    async move { client.list_dreams(&params).await }.boxed()
  }
}

/// Interpret a new dream; refreshes the journal and seeds the saved entry.
pub struct InterpretDream {
  client: ApiClient,
  stale: StaleTimes,
}

impl MutationHandler for InterpretDream {
  type Input = InterpretRequest;
  type Output = InterpretResponse;

  fn name(&self) -> &'static str {
    "interpret_dream"
  }

  fn execute(&self, input: InterpretRequest) -> BoxFuture<'static, ApiResult<InterpretResponse>> {
    let client = self.client.clone();
    async move { client.interpret_dream(&input).await }.boxed()
  }

  fn on_success(&self, cache: &RequestCache, input: &InterpretRequest, output: &InterpretResponse) {
    cache.invalidate(&DreamKeys::lists());
    if output.is_saved {
      let dream = output.to_dream(input);
      if let Err(e) = cache.set(&DreamKeys::detail(&dream.id), &dream, self.stale.detail) {
        warn!(error = %e, "could not seed interpreted dream");
      }
    }
    info!(
      dream_id = %output.dream_id,
      saved = output.is_saved,
      remaining = output.daily_limit_remaining,
      "dream interpreted"
    );
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DreamChanges {
  pub dream_id: String,
  pub changes: DreamUpdate,
}

pub struct UpdateDream {
  client: ApiClient,
}

impl MutationHandler for UpdateDream {
  type Input = DreamChanges;
  type Output = Dream;

  fn name(&self) -> &'static str {
    "update_dream"
  }

  fn execute(&self, input: DreamChanges) -> BoxFuture<'static, ApiResult<Dream>> {
    let client = self.client.clone();
    async move { client.update_dream(&input.dream_id, &input.changes).await }.boxed()
  }

  fn on_success(&self, cache: &RequestCache, input: &DreamChanges, _output: &Dream) {
    cache.invalidate(&DreamKeys::detail(&input.dream_id));
    cache.invalidate(&DreamKeys::lists());
  }
}

/// Delete a dream, removing it from every cached page up front.
pub struct DeleteDream {
  client: ApiClient,
}

impl MutationHandler for DeleteDream {
  type Input = String;
  type Output = ();

  fn name(&self) -> &'static str {
    "delete_dream"
  }

  fn execute(&self, id: String) -> BoxFuture<'static, ApiResult<()>> {
    let client = self.client.clone();
    async move { client.delete_dream(&id).await }.boxed()
  }

  fn optimistic(&self, cache: &RequestCache, id: &String) -> ApiResult<Option<Snapshot>> {
    // a refetch landing mid-delete would bring the dream back
    cache.cancel(&DreamKeys::detail(id));
    cache.cancel(&DreamKeys::lists());
    cache.cancel(&DreamKeys::searches());

    let mut snapshot = cache.update_matching::<Page<Dream>, _>(&DreamKeys::lists(), |page| page.without(id))?;
    snapshot.extend(cache.update_matching::<Page<Dream>, _>(&DreamKeys::searches(), |page| page.without(id))?);
    Ok(Some(snapshot))
  }

  fn on_success(&self, cache: &RequestCache, id: &String, _output: &()) {
    cache.remove(&DreamKeys::detail(id));
    cache.invalidate(&DreamKeys::lists());
    cache.invalidate(&DreamKeys::searches());
    info!(dream_id = %id, "dream deleted");
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrationRequest {
  pub dream_id: String,
  pub voice: Voice,
}

pub struct GenerateNarration {
  client: ApiClient,
}

impl MutationHandler for GenerateNarration {
  type Input = NarrationRequest;
  type Output = TtsResponse;

  fn name(&self) -> &'static str {
    "generate_narration"
  }

  fn execute(&self, input: NarrationRequest) -> BoxFuture<'static, ApiResult<TtsResponse>> {
    let client = self.client.clone();
    async move { client.generate_narration(&input.dream_id, input.voice).await }.boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_support::client_for;
  use crate::api::types::fixtures;
  use crate::api::ApiError;
  use crate::cache::{CacheConfig, RetryPolicy};
  use crate::query::test_support::poll_until;
  use serde_json::json;
  use std::time::Duration;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const MINUTE: Duration = Duration::from_secs(60);

  fn service(server: &MockServer) -> DreamService {
    let cache = RequestCache::new(CacheConfig {
      retry: RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
      },
      ..CacheConfig::default()
    });
    DreamService::new(client_for(server, Some("t")), cache, StaleTimes::default())
  }

  fn seed_lists(service: &DreamService) {
    let cache = service.cache();
    cache
      .set(&DreamKeys::list(&ListParams::default()), &fixtures::page(&["a", "b", "c"]), MINUTE)
      .unwrap();
    cache
      .set(
        &DreamKeys::list(&ListParams::default().with_page(2)),
        &fixtures::page(&["d", "e"]),
        MINUTE,
      )
      .unwrap();
    cache
      .set(&DreamKeys::search("sea"), &fixtures::page(&["b", "x"]), MINUTE)
      .unwrap();
  }

  fn cached_page(service: &DreamService, key: &crate::cache::RequestKey) -> Page<Dream> {
    service.cache().get_as::<Page<Dream>>(key).unwrap().unwrap()
  }

  fn ids(page: &Page<Dream>) -> Vec<&str> {
    page.items.iter().map(|d| d.id.as_str()).collect()
  }

  #[tokio::test]
  async fn test_delete_removes_from_every_page_before_response() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/v1/dreams/b"))
      .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
      .mount(&server)
      .await;

    let service = service(&server);
    seed_lists(&service);

    let mut delete = service.delete();
    delete.mutate("b".to_string());

    let first = cached_page(&service, &DreamKeys::list(&ListParams::default()));
    assert_eq!(ids(&first), vec!["a", "c"]);
    assert_eq!(first.total, 2);
    let second = cached_page(&service, &DreamKeys::list(&ListParams::default().with_page(2)));
    assert_eq!(ids(&second), vec!["d", "e"]);
    assert_eq!(second.total, 2);
    let search = cached_page(&service, &DreamKeys::search("sea"));
    assert_eq!(ids(&search), vec!["x"]);

    for _ in 0..100 {
      if delete.poll() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(delete.data().is_some());
    assert!(service
      .cache()
      .get(&DreamKeys::list(&ListParams::default()))
      .unwrap()
      .invalidated);
  }

  #[tokio::test]
  async fn test_failed_delete_rolls_back() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/v1/dreams/b"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let service = service(&server);
    seed_lists(&service);
    let key = DreamKeys::list(&ListParams::default());
    let before = service.cache().get(&key).unwrap();

    let result = service.delete().run("b".to_string()).await;
    assert!(matches!(result, Err(ApiError::Server { status: 500, .. })));

    let after = service.cache().get(&key).unwrap();
    assert_eq!(after.value, before.value);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(ids(&cached_page(&service, &key)), vec!["a", "b", "c"]);
    assert_eq!(cached_page(&service, &key).total, 3);
  }

  #[tokio::test]
  async fn test_list_response_during_delete_does_not_restore_dream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(fixtures::page(&["a", "b", "c"]))
          .set_delay(Duration::from_millis(50)),
      )
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/api/v1/dreams/b"))
      .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
      .mount(&server)
      .await;

    let service = service(&server);
    let key = DreamKeys::list(&ListParams::default());
    service
      .cache()
      .set(&key, &fixtures::page(&["a", "b", "c"]), Duration::ZERO)
      .unwrap();

    let mut list = service.list(ListParams::default());
    list.fetch();
    assert!(list.is_loading());

    let mut delete = service.delete();
    delete.mutate("b".to_string());

    // the patch shows up while the list request is still running
    assert!(list.poll());
    assert_eq!(ids(list.data().unwrap()), vec!["a", "c"]);

    // the list answers (with the dream still in it) before the delete does
    for _ in 0..30 {
      list.poll();
      assert_eq!(ids(list.data().unwrap()), vec!["a", "c"]);
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(list.is_success());
    assert!(delete.is_pending());
    assert_eq!(ids(&cached_page(&service, &key)), vec!["a", "c"]);
  }

  #[tokio::test]
  async fn test_interpret_invalidates_lists_and_seeds_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/dreams/interpret"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "dream_id": "new",
        "interpretation": fixtures::interpretation("new"),
        "similar_dreams": [],
        "daily_limit_remaining": 0,
        "is_saved": true
      })))
      .mount(&server)
      .await;

    let service = service(&server);
    seed_lists(&service);

    let request = InterpretRequest::new("I was climbing a staircase that never ended", "en");
    let response = service.interpret().run(request.clone()).await.unwrap();
    assert_eq!(response.dream_id, "new");

    let list = service.cache().get(&DreamKeys::list(&ListParams::default())).unwrap();
    assert!(list.invalidated);
    let seeded: Dream = service.cache().get_as(&DreamKeys::detail("new")).unwrap().unwrap();
    assert_eq!(seeded.text, request.text);
    assert_eq!(seeded.interpretation.unwrap().main_symbol, "Sea");
  }

  #[tokio::test]
  async fn test_unsaved_interpretation_seeds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/dreams/interpret"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "dream_id": "tmp",
        "interpretation": fixtures::interpretation("tmp"),
        "daily_limit_remaining": 0,
        "is_saved": false
      })))
      .mount(&server)
      .await;

    let service = service(&server);
    let request = InterpretRequest::new("A quiet dream about an old wooden house", "en");
    service.interpret().run(request).await.unwrap();
    assert!(service.cache().get(&DreamKeys::detail("tmp")).is_none());
  }

  #[tokio::test]
  async fn test_short_dream_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let service = service(&server);
    let result = service
      .interpret()
      .run(InterpretRequest::new("nineteen characters", "en"))
      .await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));
  }

  #[tokio::test]
  async fn test_concurrent_list_queries_make_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams"))
      .and(query_param("page", "1"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(fixtures::page(&["a"]))
          .set_delay(Duration::from_millis(20)),
      )
      .expect(1)
      .mount(&server)
      .await;

    let service = service(&server);
    let mut a = service.list(ListParams::default());
    let mut b = service.list(ListParams::default());
    a.fetch();
    b.fetch();

    poll_until(&mut a, |q| q.is_success()).await;
    poll_until(&mut b, |q| q.is_success()).await;
    assert_eq!(a.data(), b.data());
  }

  #[tokio::test]
  async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams/gone"))
      .respond_with(ResponseTemplate::new(404))
      .expect(1)
      .mount(&server)
      .await;

    let service = service(&server);
    let mut query = service.detail(Some("gone".to_string()));
    query.fetch();
    poll_until(&mut query, |q| q.error().is_some()).await;
    assert!(matches!(query.error(), Some(ApiError::NotFound { .. })));
  }

  #[tokio::test]
  async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams/flaky"))
      .respond_with(ResponseTemplate::new(502))
      .expect(4)
      .mount(&server)
      .await;

    let service = service(&server);
    let mut query = service.detail(Some("flaky".to_string()));
    query.fetch();
    poll_until(&mut query, |q| q.error().is_some()).await;
  }

  #[tokio::test]
  async fn test_rate_limit_keeps_cached_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})))
      .expect(1)
      .mount(&server)
      .await;

    let service = service(&server);
    let key = DreamKeys::list(&ListParams::default());
    service.cache().set(&key, &fixtures::page(&["a"]), Duration::ZERO).unwrap();

    let mut query = service.list(ListParams::default());
    query.fetch();
    poll_until(&mut query, |q| q.error().is_some()).await;

    assert!(matches!(query.error(), Some(ApiError::RateLimited { .. })));
    assert_eq!(ids(query.data().unwrap()), vec!["a"]);
  }

  #[tokio::test]
  async fn test_detail_and_search_enablement() {
    let server = MockServer::start().await;
    let service = service(&server);

    let mut detail = service.detail(None);
    detail.fetch();
    assert!(!detail.is_enabled());
    assert!(!detail.is_loading());

    assert!(!service.search("ab").is_enabled());
    assert!(!service.search("  ab  ").is_enabled());
    assert!(service.search("abc").is_enabled());
  }
}
