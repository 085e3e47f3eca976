//! Log output setup: console plus one timestamped file per run.
//!
//! # How it fits together (for beginners)
//!
//! `tracing` macros (`info!`, `warn!`, ...) produce events.  A *subscriber*
//! decides where they go.  We build one from three layers:
//!
//! 1. an [`EnvFilter`] that drops events below the configured level
//!    (`RUST_LOG` wins over the config file when it is set);
//! 2. a console formatter;
//! 3. a file formatter writing through a background thread
//!    (`tracing_appender::non_blocking`), so a slow disk never stalls a USB
//!    transfer.
//!
//! The background writer flushes when its [`WorkerGuard`] is dropped, so the
//! caller must hold the guard until the program exits.
//!
//! Every run writes `<directory>/<YYYY-MM-DD_HH-MM-SS>-log.txt`; older files
//! beyond the retention count are deleted at startup.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, EnvFilter};

use crate::infrastructure::storage::config::LoggingConfig;

/// File name suffix shared by every log file.
pub const LOG_FILE_SUFFIX: &str = "-log.txt";

/// Error type for logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("I/O error accessing log directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log level: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to create log file: {0}")]
    Appender(#[from] InitError),

    #[error("a global subscriber is already installed: {0}")]
    Init(#[from] TryInitError),
}

/// Name of the log file for a run started now.
pub fn log_file_name() -> String {
    format!(
        "{}{LOG_FILE_SUFFIX}",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Installs the global subscriber.
///
/// `level_override` (from `--log-level`) replaces `config.level`; `RUST_LOG`
/// replaces both.
///
/// # Errors
///
/// Returns [`LoggingError`] if the directory cannot be created, the level
/// does not parse, or a subscriber is already installed.
pub fn init_logging(
    config: &LoggingConfig,
    level_override: Option<&str>,
) -> Result<WorkerGuard, LoggingError> {
    let directory = &config.directory;
    std::fs::create_dir_all(directory).map_err(|source| LoggingError::Io {
        path: directory.clone(),
        source,
    })?;

    let level = level_override.unwrap_or(&config.level);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };

    let file_name = log_file_name();
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.as_str())
        .build(directory)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    let removed = prune_logs(directory, config.retain)?;
    debug!(
        "logging to {} ({} old log files removed)",
        directory.join(&file_name).display(),
        removed.len()
    );
    Ok(guard)
}

/// Deletes the oldest `*-log.txt` files in `directory` so that at most
/// `retain` remain.  Returns the paths removed.
///
/// File names start with a sortable timestamp, so name order is age order.
/// A file that cannot be deleted is skipped.
///
/// # Errors
///
/// Returns [`LoggingError::Io`] if the directory cannot be listed.
pub fn prune_logs(directory: &Path, retain: usize) -> Result<Vec<PathBuf>, LoggingError> {
    let entries = std::fs::read_dir(directory).map_err(|source| LoggingError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut logs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(LOG_FILE_SUFFIX))
        })
        .collect();

    if logs.len() <= retain {
        return Ok(Vec::new());
    }

    logs.sort();
    let excess = logs.len() - retain;
    Ok(logs
        .into_iter()
        .take(excess)
        .filter(|path| std::fs::remove_file(path).is_ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("calclink-logs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_log_file_name_has_timestamp_and_suffix() {
        let name = log_file_name();

        assert!(name.ends_with(LOG_FILE_SUFFIX));
        // "YYYY-MM-DD_HH-MM-SS" is 19 characters
        assert_eq!(name.len(), 19 + LOG_FILE_SUFFIX.len());
        assert_eq!(&name[10..11], "_");
    }

    #[test]
    fn test_prune_keeps_the_five_newest_logs() {
        // Arrange
        let dir = scratch_dir();
        for day in 1..=7 {
            touch(&dir, &format!("2025-01-0{day}_12-00-00-log.txt"));
        }

        // Act
        let removed = prune_logs(&dir, 5).unwrap();

        // Assert
        let mut removed_names: Vec<String> = removed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        removed_names.sort();
        assert_eq!(
            removed_names,
            vec!["2025-01-01_12-00-00-log.txt", "2025-01-02_12-00-00-log.txt"]
        );
        let remaining = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(remaining, 5);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_prune_ignores_other_files() {
        let dir = scratch_dir();
        touch(&dir, "notes.txt");
        touch(&dir, "2025-01-01_12-00-00-log.txt");
        touch(&dir, "2025-01-02_12-00-00-log.txt");

        let removed = prune_logs(&dir, 1).unwrap();

        assert_eq!(removed, vec![dir.join("2025-01-01_12-00-00-log.txt")]);
        assert!(dir.join("notes.txt").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_prune_under_limit_removes_nothing() {
        let dir = scratch_dir();
        touch(&dir, "2025-01-01_12-00-00-log.txt");

        assert!(prune_logs(&dir, 5).unwrap().is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_prune_missing_directory_is_io_error() {
        let dir = std::env::temp_dir().join(format!("calclink-missing-{}", uuid::Uuid::new_v4()));

        assert!(matches!(prune_logs(&dir, 5), Err(LoggingError::Io { .. })));
    }
}
