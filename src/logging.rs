//! Tracing setup for the server and the CLI.
//!
//! The server logs compactly to stdout and, through a non-blocking appender, to a file:
//! `BOOKBRIEF_LOG_FILE` when set, `logs/bookbrief.log` otherwise. The CLI logs to stderr only so
//! its stdout stays machine-readable.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable overriding the log file location.
pub const LOG_FILE_ENV: &str = "BOOKBRIEF_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "bookbrief.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the server subscriber. `RUST_LOG` filters, defaulting to `info`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match open_log_writer(&log_file_path(std::env::var(LOG_FILE_ENV).ok())) {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact(),
            )
            .init(),
        None => registry.init(),
    }
}

/// Install a stderr-only subscriber for command-line tools. Defaults to `warn`.
pub fn init_cli_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Resolve the log file from an optional override.
pub fn log_file_path(override_path: Option<String>) -> PathBuf {
    match override_path.map(|path| path.trim().to_string()) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE),
    }
}

/// Open `path` for appending behind a non-blocking writer.
///
/// Returns `None` when the parent directory cannot be created or the file cannot be opened; the
/// server then logs to stdout only.
fn open_log_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_default_location() {
        assert_eq!(
            log_file_path(Some("/var/log/bb.log".into())),
            PathBuf::from("/var/log/bb.log")
        );
        assert_eq!(log_file_path(None), PathBuf::from("logs/bookbrief.log"));
        assert_eq!(log_file_path(Some("  ".into())), PathBuf::from("logs/bookbrief.log"));
    }
}
