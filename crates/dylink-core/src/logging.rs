//! File logging for the dylink binary
//!
//! One rolling file per UTC day under the log directory. The filter comes from
//! `DYLINK_LOG`; a filter that does not parse falls back to the default and is
//! reported once logging is up.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result, ResultExt};

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "DYLINK_LOG";

/// Moves logs (and config) under one directory when set
const HOME_ENV_VAR: &str = "DYLINK_HOME";

const LOG_FILE_PREFIX: &str = "dylink.log";

/// Targets match by prefix, so `dylink` also covers the `dylink_*` crates
const DEFAULT_FILTER: &str = "dylink=info,warn";

/// Install the file subscriber.
///
/// ```bash
/// DYLINK_LOG=debug dylink status
/// DYLINK_LOG=dylink_patcher=trace dylink attach
/// ```
pub fn init() -> Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let (env_filter, rejected) = filter_from(std::env::var(LOG_ENV_VAR).ok().as_deref());
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::config(format!("Logging already initialized: {}", e)))?;

    tracing::info!(
        "dylink {} starting, logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );
    if let Some(reason) = rejected {
        tracing::warn!("Ignoring {}: {}", LOG_ENV_VAR, reason);
    }

    Ok(())
}

/// Parse a filter directive, falling back to the default.
///
/// The second value carries the parse error when `spec` was rejected.
fn filter_from(spec: Option<&str>) -> (EnvFilter, Option<String>) {
    match spec.map(str::trim).filter(|s| !s.is_empty()) {
        None => (EnvFilter::new(DEFAULT_FILTER), None),
        Some(spec) => match EnvFilter::try_new(spec) {
            Ok(filter) => (filter, None),
            Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(e.to_string())),
        },
    }
}

/// `$DYLINK_HOME/logs`, else the platform data directory
pub fn log_directory() -> PathBuf {
    let home = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty());
    log_directory_in(home.as_deref().map(Path::new))
}

fn log_directory_in(home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) => home.join("logs"),
        None => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dylink")
            .join("logs"),
    }
}

/// File the appender is writing to today
pub fn get_current_log_file() -> PathBuf {
    let day = chrono::Utc::now().format("%Y-%m-%d");
    log_directory().join(format!("{}.{}", LOG_FILE_PREFIX, day))
}
