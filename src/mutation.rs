//! Writes bound to a view action.
//!
//! A [`MutationHandler`] describes one write: the request itself plus how it
//! touches the cache (optimistic patch before the request, invalidation or
//! seeding after it). [`Mutation`] runs a handler and tracks its state the
//! same way [`crate::query::Query`] does for reads.

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiResult};
use crate::cache::{RequestCache, Snapshot};

pub trait MutationHandler: Send + Sync + 'static {
  type Input: Clone + Send + Sync + 'static;
  type Output: Clone + Send + 'static;

  /// Name used in logs.
  fn name(&self) -> &'static str;

  /// Issue the request.
  fn execute(&self, input: Self::Input) -> BoxFuture<'static, ApiResult<Self::Output>>;

  /// Patch the cache before the request is sent. The returned snapshot is
  /// restored if the request fails.
  fn optimistic(&self, _cache: &RequestCache, _input: &Self::Input) -> ApiResult<Option<Snapshot>> {
    Ok(None)
  }

  fn on_success(&self, _cache: &RequestCache, _input: &Self::Input, _output: &Self::Output) {}

  /// Runs after success or failure (after any rollback).
  fn on_settled(&self, _cache: &RequestCache, _input: &Self::Input) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<O> {
  Idle,
  Pending,
  Success(O),
  Error(ApiError),
}

pub struct Mutation<H: MutationHandler> {
  handler: Arc<H>,
  cache: RequestCache,
  state: MutationState<H::Output>,
  receiver: Option<oneshot::Receiver<ApiResult<H::Output>>>,
}

impl<H: MutationHandler> Mutation<H> {
  pub fn new(cache: RequestCache, handler: H) -> Self {
    Self {
      handler: Arc::new(handler),
      cache,
      state: MutationState::Idle,
      receiver: None,
    }
  }

  pub fn state(&self) -> &MutationState<H::Output> {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, MutationState::Pending)
  }

  pub fn data(&self) -> Option<&H::Output> {
    match &self.state {
      MutationState::Success(output) => Some(output),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match &self.state {
      MutationState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Back to idle, dropping any result still on its way.
  pub fn reset(&mut self) {
    self.receiver = None;
    self.state = MutationState::Idle;
  }

  /// Start the write in the background; watch it with [`Mutation::poll`].
  ///
  /// The optimistic patch, if any, is in the cache when this returns.
  pub fn mutate(&mut self, input: H::Input) {
    let snapshot = self.prepare(&input);
    let settle = settle(Arc::clone(&self.handler), self.cache.clone(), input, snapshot);

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(settle.await);
    });

    self.receiver = Some(rx);
    self.state = MutationState::Pending;
  }

  /// Run the write to completion.
  pub async fn run(&mut self, input: H::Input) -> ApiResult<H::Output> {
    self.receiver = None;
    let snapshot = self.prepare(&input);
    self.state = MutationState::Pending;

    let result = settle(Arc::clone(&self.handler), self.cache.clone(), input, snapshot).await;
    self.state = match &result {
      Ok(output) => MutationState::Success(output.clone()),
      Err(e) => MutationState::Error(e.clone()),
    };
    result
  }

  /// Returns `true` if the mutation finished since the last poll.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        self.state = match result {
          Ok(output) => MutationState::Success(output),
          Err(e) => MutationState::Error(e),
        };
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.receiver = None;
        self.state = MutationState::Error(ApiError::Network {
          message: "request was dropped".to_string(),
        });
        true
      }
    }
  }

  fn prepare(&self, input: &H::Input) -> Option<Snapshot> {
    match self.handler.optimistic(&self.cache, input) {
      Ok(snapshot) => snapshot,
      Err(e) => {
        warn!(mutation = self.handler.name(), error = %e, "optimistic update skipped");
        None
      }
    }
  }
}

async fn settle<H: MutationHandler>(
  handler: Arc<H>,
  cache: RequestCache,
  input: H::Input,
  snapshot: Option<Snapshot>,
) -> ApiResult<H::Output> {
  let result = handler.execute(input.clone()).await;

  match &result {
    Ok(output) => {
      debug!(mutation = handler.name(), "mutation succeeded");
      handler.on_success(&cache, &input, output);
    }
    Err(e) => {
      warn!(mutation = handler.name(), error = %e, "mutation failed");
      if let Some(snapshot) = snapshot {
        cache.restore(snapshot);
        debug!(mutation = handler.name(), "optimistic update rolled back");
      }
    }
  }

  handler.on_settled(&cache, &input);
  result
}
