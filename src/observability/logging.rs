//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Write to stdout and, optionally, to rotated files
//! - Configure the log level from config or environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - File output goes through a non-blocking writer; the returned
//!   [`LogGuard`] must be held until exit so buffered lines get flushed

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogConfig, LogFormat, LogRotation};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to open log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber for the service `name`.
pub fn init(name: &str, config: &LogConfig) -> Result<LogGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let mut guard = LogGuard::default();
    let file_layer = if config.dir.is_empty() {
        None
    } else {
        let appender = file_appender(name, config)?;
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard._file = Some(worker);
        Some(format_layer(config.format, writer, false))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(config.format, std::io::stdout, true))
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        service = %name,
        level = %config.level,
        dir = %config.dir,
        "Logging initialized"
    );
    Ok(guard)
}

/// Rolling appender writing `<dir>/<name>[.<date>].log`.
pub fn file_appender(name: &str, config: &LogConfig) -> Result<RollingFileAppender, LoggingError> {
    let rotation = match config.rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(name)
        .filename_suffix("log");
    if config.max_files > 0 {
        builder = builder.max_log_files(config.max_files);
    }
    Ok(builder.build(Path::new(&config.dir))?)
}

fn format_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Text => fmt::layer().with_ansi(ansi).with_writer(writer).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_appender_writes_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            dir: dir.path().to_string_lossy().into_owned(),
            rotation: LogRotation::Never,
            ..LogConfig::default()
        };

        let mut appender = file_appender("svc", &config).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("svc"));
        assert!(names[0].ends_with(".log"));
    }
}
