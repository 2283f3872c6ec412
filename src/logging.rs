//! Tracing setup: stderr output plus an optional daily rolling log file.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogConfig;

const LOG_ENV: &str = "CHARPAGE_LOG";

/// Install the global subscriber.
///
/// The filter comes from `CHARPAGE_LOG`, then `RUST_LOG`, then the config.
/// The returned guard must be held until exit so buffered file output is
/// flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = build_filter(config);

  let (file_layer, guard) = match &config.directory {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::daily(dir, "charpage.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  let stderr_layer = fmt::layer()
    .with_target(false)
    .with_writer(std::io::stderr);

  tracing_subscriber::registry()
    .with(filter)
    .with(stderr_layer)
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn build_filter(config: &LogConfig) -> EnvFilter {
  let directive = std::env::var(LOG_ENV)
    .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
    .unwrap_or_else(|_| config.filter.clone());

  EnvFilter::try_new(&directive).unwrap_or_else(|err| {
    eprintln!(
      "invalid log filter '{}' ({}); falling back to '{}'",
      directive, err, config.filter
    );
    EnvFilter::new(&config.filter)
  })
}
