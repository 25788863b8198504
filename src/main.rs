mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod store;
mod ui;

use api::{PatternClient, PatternQueryKey};
use cache::{CacheStorage, NoopStorage, SqliteStorage, StorageBackend};
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use store::{PatternStore, StoreOptions};
use tracing::{info, warn};
use ui::views::PatternListView;

#[derive(Parser, Debug)]
#[command(name = "pxp")]
#[command(about = "A terminal UI for managing proxy patterns")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./pxp.yaml, then $XDG_CONFIG_HOME/pxp/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Pattern service base URL, overrides the config file and PXP_API_URL
  #[arg(long)]
  api_url: Option<String>,

  /// Neither read nor write the on-disk snapshot
  #[arg(long)]
  no_cache: bool,

  /// Delete the on-disk snapshot before starting
  #[arg(long)]
  clear_cache: bool,
}

fn open_storage(args: &Args, persist: bool) -> Result<StorageBackend> {
  if args.no_cache || !persist {
    if args.clear_cache {
      warn!("--clear-cache ignored, the snapshot cache is disabled");
    }
    return Ok(StorageBackend::Noop(NoopStorage));
  }

  let storage = match SqliteStorage::open() {
    Ok(storage) => StorageBackend::Sqlite(storage),
    Err(e) => {
      // Not fatal, the app works without a snapshot
      warn!(error = %e, "failed to open snapshot cache, continuing without it");
      return Ok(StorageBackend::Noop(NoopStorage));
    }
  };

  if args.clear_cache {
    storage.clear_query(&PatternQueryKey::List)?;
    info!("cleared pattern snapshot");
  }
  Ok(storage)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Keep the guard alive so buffered log lines are flushed on exit
  let _log_guard = logging::init(&logging::default_log_dir()?)?;

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url.clone() {
    config = config.with_api_url(url)?;
  }
  let client = PatternClient::from_config(&config.api)?;
  info!(api = client.base_url(), policy = ?config.cache.policy, "starting pxp");

  let storage = open_storage(&args, config.cache.persist)?;
  let store = PatternStore::new(
    Arc::new(client),
    storage,
    StoreOptions::from(&config.cache),
  );

  let mut app = app::App::new(config.display_title(), Box::new(PatternListView::new(store)));
  app.run().await?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clear_cache_with_cache_disabled_keeps_noop() {
    let args = Args::parse_from(["pxp", "--no-cache", "--clear-cache"]);
    let storage = open_storage(&args, true).unwrap();
    assert!(matches!(storage, StorageBackend::Noop(_)));

    let args = Args::parse_from(["pxp", "--clear-cache"]);
    let storage = open_storage(&args, false).unwrap();
    assert!(matches!(storage, StorageBackend::Noop(_)));
  }
}
