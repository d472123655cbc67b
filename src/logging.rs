//! Structured logging setup: console always, optional file sink.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::{EemsError, Result};

/// Initializes the global tracing subscriber per `[logging]` config.
///
/// Console output is always enabled; a file sink is added when
/// `logging.path` is set, truncated or appended per `logging.truncate`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .boxed();

    let registry = tracing_subscriber::registry().with(env_filter).with(console_layer);

    if let Some(path) = &config.path {
        let file = open_log_file(path, config.truncate)?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_timer(LocalTime::rfc_3339())
            .with_ansi(false)
            .with_writer(file)
            .boxed();
        registry.with(file_layer).try_init().map_err(|e| EemsError::Fatal(e.to_string()))?;
    } else {
        registry.try_init().map_err(|e| EemsError::Fatal(e.to_string()))?;
    }

    Ok(())
}

fn open_log_file(path: &Path, truncate: bool) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(!truncate)
        .truncate(truncate)
        .open(path)
        .map_err(EemsError::IOError)
}
