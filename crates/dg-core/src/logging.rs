use std::path::Path;

use dg_config::Config;
use dg_types::{DocGateError, Result};
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILE_NAME: &str = "docgate.log";

/// Initialize the tracing/logging system.
///
/// Sets up a console layer (JSON when `structured`, ANSI otherwise) and an
/// optional daily-rolling file layer. `RUST_LOG` takes precedence over
/// `log_level`. Fails if a global subscriber is already installed.
pub fn init_logging(log_level: &str, log_file: Option<&Path>, structured: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = if structured {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .boxed()
    };

    let file_layer = log_file.map(|log_path| {
        let (dir, filename) = split_log_path(log_path);
        let file_appender = rolling::daily(dir, filename);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_ansi(false);
        if structured {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| DocGateError::Other(format!("Failed to initialize logging: {e}")))
}

/// [`init_logging`] driven by the loaded configuration.
pub fn init_logging_from_config(config: &Config) -> Result<()> {
    init_logging(
        &config.log_level,
        config.log_file.as_deref(),
        config.log_structured,
    )
}

fn split_log_path(log_path: &Path) -> (&Path, String) {
    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let filename = log_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
    (dir, filename)
}
