//! File logging setup
//!
//! The terminal belongs to the TUI, so tracing output goes to a log file in
//! the platform data directory (`~/.local/share/todoquery/` on Linux)
//! through a non-blocking writer.

use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Name of the log file inside the log directory
pub const LOG_FILE_NAME: &str = "todoquery.log";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] io::Error),

    #[error("A global logger is already installed")]
    AlreadyInitialized,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level when RUST_LOG is unset
    pub level: String,
    /// Overrides the platform data directory
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    /// Directory the log file goes to, if one can be determined
    pub fn resolve_dir(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(|| {
            ProjectDirs::from("", "", "todoquery").map(|dirs| dirs.data_local_dir().to_path_buf())
        })
    }
}

pub fn parse_log_level(level: &str) -> Result<Level, LogError> {
    match level.to_lowercase().trim() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LogError::InvalidLevel(level.to_string())),
    }
}

/// Installs the global file logger
///
/// Returns `Ok(None)` when no log directory can be determined; logging is
/// then disabled. Keep the returned guard alive for the whole run, dropping
/// it flushes the writer.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, LogError> {
    let level = parse_log_level(&config.level)?;
    let Some(dir) = config.resolve_dir() else {
        return Ok(None);
    };
    fs::create_dir_all(&dir)?;

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .finish()
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)?;

    tracing::info!(dir = %dir.display(), "logging initialized");
    Ok(Some(guard))
}
