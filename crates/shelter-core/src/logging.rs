use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::time::{LocalTime, UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::config_directory;

const LOG_FILE_NAME: &str = "shelter.log";
const LOG_FILTER_ENV: &str = "SHELTER_LOG";

/// Controls where structured logs are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingDestination {
    /// JSON lines to the log file plus human-readable lines on stderr (CLI use).
    FileAndStderr,
    /// JSON lines to the log file only, for embedding in a UI process.
    FileOnly,
    /// Human-readable lines on stderr only.
    StderrOnly,
}

impl LoggingDestination {
    fn writes_file(self) -> bool {
        matches!(
            self,
            LoggingDestination::FileAndStderr | LoggingDestination::FileOnly
        )
    }

    fn writes_stderr(self) -> bool {
        matches!(
            self,
            LoggingDestination::FileAndStderr | LoggingDestination::StderrOnly
        )
    }
}

#[derive(Debug)]
struct LoggingGuards {
    _guard: Option<WorkerGuard>,
    log_path: Option<PathBuf>,
}

static LOGGING_STATE: OnceLock<LoggingGuards> = OnceLock::new();

/// Errors that can arise while standing up structured logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] io::Error),
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber, writing files under `<config dir>/logs`.
///
/// The first call wins; later calls return the path chosen by the first.
pub fn init_logging(
    destination: LoggingDestination,
) -> Result<Option<&'static PathBuf>, LoggingError> {
    init_logging_in(destination, &config_directory().join("logs"))
}

/// Same as [`init_logging`] with an explicit log directory.
pub fn init_logging_in(
    destination: LoggingDestination,
    log_dir: &Path,
) -> Result<Option<&'static PathBuf>, LoggingError> {
    if LOGGING_STATE.get().is_none() {
        let guards = install_logging(destination, log_dir)?;
        if let Err(guards) = LOGGING_STATE.set(guards) {
            drop(guards);
        }
    }

    Ok(current_log_path())
}

/// Returns the log file path selected during logging initialization (if any).
pub fn current_log_path() -> Option<&'static PathBuf> {
    LOGGING_STATE
        .get()
        .and_then(|guards| guards.log_path.as_ref())
}

fn install_logging(
    destination: LoggingDestination,
    log_dir: &Path,
) -> Result<LoggingGuards, LoggingError> {
    let filter = build_filter()?;

    let (file_layer, guard, log_path) = if destination.writes_file() {
        fs::create_dir_all(log_dir)?;
        let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .event_format(
                tracing_subscriber::fmt::format()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_level(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with_writer(writer)
            .with_ansi(false);
        (
            Some(layer),
            Some(worker_guard),
            Some(log_dir.join(LOG_FILE_NAME)),
        )
    } else {
        (None, None, None)
    };

    let stderr_layer = destination.writes_stderr().then(stderr_layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if let Some(path) = log_path.as_ref() {
        info!(path = %path.display(), "Structured logging enabled");
    }

    Ok(LoggingGuards {
        _guard: guard,
        log_path,
    })
}

fn stderr_layer<S>() -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_timer(LocalTime::rfc_3339())
                .with_level(true)
                .with_target(true)
                .with_ansi(false),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .boxed()
}

fn build_filter() -> Result<EnvFilter, ParseError> {
    if let Ok(spec) = env::var(LOG_FILTER_ENV) {
        if !spec.trim().is_empty() {
            return EnvFilter::try_new(spec);
        }
    }

    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new("info"),
    }
}
