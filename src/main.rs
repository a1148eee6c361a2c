mod api;
mod app;
mod cache;
mod catalog;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod mutation;
mod navigation;
mod notify;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::{ApiClient, AuthService, DreamService, TokenStore};
use crate::cache::RequestCache;
use crate::db::SessionStash;
use crate::notify::Notifier;
use crate::ui::view::Context;

/// Stash entries older than this are dropped at startup
const STASH_MAX_AGE_HOURS: i64 = 1;

#[derive(Parser, Debug)]
#[command(name = "dreambook")]
#[command(about = "Interpret your dreams and keep a dream journal from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dreambook/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Interpretation service base URL
  #[arg(long)]
  api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  let data_dir = db::data_dir()?;
  let _log_guard = logging::init(&data_dir)?;
  info!(api = %config.api.url, "starting dreambook");

  let stash = SessionStash::open()?;
  if let Err(e) = stash.purge_older_than(chrono::Duration::hours(STASH_MAX_AGE_HOURS)) {
    warn!(error = %e, "could not purge session stash");
  }

  let (session_tx, session_rx) = mpsc::unbounded_channel();
  let client = ApiClient::new(&config.api.url, config.api.timeout(), TokenStore::from_env())?
    .with_session_events(session_tx);
  let cache = RequestCache::new(config.cache.cache_config());
  let stale = config.cache.stale_times();

  let ctx = Context {
    dreams: DreamService::new(client.clone(), cache.clone(), stale),
    auth: AuthService::new(client, cache, stale),
    notifier: Notifier::default(),
    stash: Arc::new(stash),
    language: config.api.language.clone(),
    audio_dir: data_dir.join("narrations"),
  };

  let mut app = app::App::new(config, ctx, session_rx);
  app.run().await?;

  Ok(())
}
