use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "mathtutor.log";

/// Flushes the file log on drop; hold it for the lifetime of the process.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber: stdout always, plus a daily rolling file when enabled.
pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if config.enable_file_logs {
        match daily_file_writer(&config.log_dir) {
            Ok((writer, guard)) => (
                Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true)),
                Some(FileLogGuard { _guard: guard }),
            ),
            Err(err) => {
                eprintln!("file logging disabled, cannot create {}: {err}", config.log_dir.display());
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    guard
}

fn daily_file_writer(log_dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_file_writer_creates_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs/nested");

        let (_writer, guard) = daily_file_writer(&log_dir).unwrap();
        assert!(log_dir.is_dir());
        drop(guard);
    }

    #[test]
    fn test_daily_file_writer_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(daily_file_writer(&blocker.join("logs")).is_err());
    }
}
