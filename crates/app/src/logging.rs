//! Logging setup
//!
//! Console output goes through `EnvFilter` (default `info`, or `debug` with
//! `detailed_logging`). When `error_log_path` is set, warnings and errors are
//! also appended to that file without ANSI colors.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use huntsync_core::{Error, Result, SyncConfig};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Open (or create) the append-only error log
pub fn open_error_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber
pub fn init(config: &SyncConfig) -> Result<()> {
    let default_level = if config.detailed_logging { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (error_file, open_error) = match config.error_log_path.as_deref().map(open_error_log) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let error_layer = error_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .with(error_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))?;

    if let Some(e) = open_error {
        tracing::warn!(error = %e, "Error opening/creating error log");
    }
    Ok(())
}
