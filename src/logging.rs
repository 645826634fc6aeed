//! Logging initialisation.
//!
//! Two layers: a console layer on stderr (WARN by default, DEBUG with
//! `--verbose`) and a per-run file layer that always captures DEBUG so the
//! log file holds the full trail of every remote call.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("could not create log directory {path}: {err}")]
    LogDir { path: PathBuf, err: String },
    #[error("could not create log file {path}: {err}")]
    LogFile { path: PathBuf, err: String },
    #[error("init logging error: `{0}`")]
    TryInit(String),
}

/// Initialise the tracing subscriber and return the log file path plus the
/// worker guard that must stay alive for the duration of the process.
pub fn try_init(
    verbose: bool,
    log_dir: &Path,
    log_prefix: &str,
) -> Result<(PathBuf, WorkerGuard), LoggingError> {
    fs::create_dir_all(log_dir).map_err(|err| LoggingError::LogDir {
        path: log_dir.to_path_buf(),
        err: err.to_string(),
    })?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H%M%S");
    let log_path = log_dir.join(format!("{log_prefix}_{timestamp}.log"));
    let file = File::create(&log_path).map_err(|err| LoggingError::LogFile {
        path: log_path.clone(),
        err: err.to_string(),
    })?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(LevelFilter::DEBUG);

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(console_level.into())
                .from_env_lossy(),
        );

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| LoggingError::TryInit(err.to_string()))?;

    Ok((log_path, guard))
}
