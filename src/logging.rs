//! Log setup. The terminal belongs to the UI, so logs go to a daily file.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, e.g. `pxp=debug`
pub const LOG_ENV: &str = "PXP_LOG";

const DEFAULT_FILTER: &str = "info";

/// Default log directory: $XDG_DATA_HOME/pxp/logs
pub fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir().ok_or_else(|| eyre!("Could not determine data directory"))?;
  Ok(data_dir.join("pxp").join("logs"))
}

/// Build the filter from `PXP_LOG`, falling back to `info` when unset or invalid.
fn filter_from(value: Option<&str>) -> EnvFilter {
  value
    .and_then(|v| EnvFilter::try_new(v).ok())
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber writing to `dir`.
///
/// The returned guard flushes buffered lines when dropped, so keep it alive
/// until the terminal is restored.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)?;

  let appender = tracing_appender::rolling::daily(dir, "pxp.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = filter_from(std::env::var(LOG_ENV).ok().as_deref());

  tracing_subscriber::registry()
    .with(filter)
    .with(
      fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_filter_defaults_to_info() {
    assert_eq!(filter_from(None).to_string(), "info");
    assert_eq!(filter_from(Some("pxp=loud")).to_string(), "info");
  }

  #[test]
  fn test_filter_from_env_value() {
    assert_eq!(filter_from(Some("pxp=debug")).to_string(), "pxp=debug");
  }
}
