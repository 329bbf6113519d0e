//! Command-line interface parsing for todoquery
//!
//! Parses CLI arguments with clap and validates them into a `StartupConfig`
//! before the terminal is switched into raw mode.

use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::api::JSONPLACEHOLDER_BASE_URL;
use crate::logging::{parse_log_level, LogConfig};
use crate::pages::Page;
use crate::query::{QueryConfig, RetryPolicy};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified page name is not recognized
    #[error("Invalid page: '{0}'. Valid pages: index, pattern2, mutation")]
    InvalidPage(String),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid log level: '{0}'. Valid levels: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// todoquery - browse todos through a caching query client
#[derive(Parser, Debug)]
#[command(name = "todoquery")]
#[command(about = "Todo pages backed by a deduplicating, invalidating query cache")]
#[command(version)]
pub struct Cli {
    /// Page to open: index, pattern2 or mutation
    #[arg(long, value_name = "PAGE", default_value = "index")]
    pub page: String,

    /// Todo id to show first
    #[arg(long, value_name = "ID", default_value_t = 1)]
    pub id: u64,

    /// Base URL of the todo API
    #[arg(long, value_name = "URL", default_value = JSONPLACEHOLDER_BASE_URL)]
    pub base_url: String,

    /// Seconds a fetched todo counts as fresh
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub stale_time: u64,

    /// Extra attempts for failed fetches (0 disables retrying)
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub retries: u32,

    /// Log level written to the log file (RUST_LOG overrides)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory for the log file (defaults to the platform data directory)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Validated configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub page: Page,
    pub id: u64,
    pub base_url: String,
    pub query: QueryConfig,
    pub retry: RetryPolicy,
    pub log: LogConfig,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            page: Page::default(),
            id: 1,
            base_url: JSONPLACEHOLDER_BASE_URL.to_string(),
            query: QueryConfig::default(),
            retry: RetryPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

/// Parses a page argument into a `Page`.
pub fn parse_page_arg(s: &str) -> Result<Page, CliError> {
    Page::from_str(s).ok_or_else(|| CliError::InvalidPage(s.to_string()))
}

/// Checks that `s` is an absolute http(s) URL
pub fn parse_base_url_arg(s: &str) -> Result<String, CliError> {
    let url = Url::parse(s).map_err(|e| CliError::InvalidBaseUrl {
        url: s.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CliError::InvalidBaseUrl {
            url: s.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(s.trim_end_matches('/').to_string())
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let page = parse_page_arg(&cli.page)?;
        let base_url = parse_base_url_arg(&cli.base_url)?;
        parse_log_level(&cli.log_level)
            .map_err(|_| CliError::InvalidLogLevel(cli.log_level.clone()))?;

        let retry = if cli.retries == 0 {
            RetryPolicy::none()
        } else {
            RetryPolicy {
                retries: cli.retries,
                ..RetryPolicy::default()
            }
        };

        Ok(StartupConfig {
            page,
            id: cli.id,
            base_url,
            query: QueryConfig {
                stale_time: Duration::from_secs(cli.stale_time),
            },
            retry,
            log: LogConfig {
                level: cli.log_level.to_lowercase(),
                log_dir: cli.log_dir.clone(),
            },
        })
    }
}
