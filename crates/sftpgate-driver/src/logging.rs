//! Tracing subscriber setup.
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). When the
//! configuration names a log file, the same events are appended there too
//! through a non-blocking writer.

use std::fs::OpenOptions;
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer.
pub fn init(logging: &LoggingConfig) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The only test in this binary that installs a global subscriber.
    #[test]
    fn test_file_layer_receives_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sftpgate.log");
        let config = LoggingConfig {
            file: Some(path.clone()),
        };

        let guard = init(&config).unwrap();
        assert!(guard.is_some());
        tracing::error!("written to the log file");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("written to the log file"));

        // A second subscriber cannot be installed.
        assert!(init(&LoggingConfig::default()).is_err());
    }
}
