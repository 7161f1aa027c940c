//! Global `tracing` subscriber for discovery runs.

use std::ffi::OsString;
use std::path::PathBuf;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Overrides the directory log files are written to.
pub const LOG_DIR_ENV: &str = "LOADERSCOPE_LOG_DIR";
/// Filter directives; falls back to `RUST_LOG`, then `info`.
pub const LOG_FILTER_ENV: &str = "LOADERSCOPE_LOG";

const DEFAULT_FILTER: &str = "info";

/// Directory the file layer writes to for the current environment.
pub fn log_dir() -> PathBuf {
    resolve_log_dir(
        std::env::var_os(LOG_DIR_ENV),
        std::env::var_os("HOME"),
    )
}

fn resolve_log_dir(dir_override: Option<OsString>, home: Option<OsString>) -> PathBuf {
    if let Some(dir) = dir_override.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    home.filter(|h| !h.is_empty())
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".loaderscope")
        .join("logs")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. `component` names the daily-rolling file
/// (`<component>.log.<date>`); `to_stderr` adds a human-readable layer.
///
/// Returns the file writer's guard, which flushes on drop. `None` when the
/// log directory cannot be created or a subscriber is already installed.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<WorkerGuard> {
    let dir = log_dir();
    let (file_writer, guard, dir_error) = match std::fs::create_dir_all(&dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&dir, format!("{component}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });
    let stderr_layer = to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();
    if !installed {
        return None;
    }

    if let Some(e) = dir_error {
        warn!("File logging disabled, cannot create {}: {}", dir.display(), e);
    }
    guard
}
