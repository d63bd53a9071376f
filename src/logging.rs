//! Logging initialization for the `tablebeam` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the process. [`init_logging`] installs a `tracing-subscriber` registry
//! with an [`EnvFilter`] and a text or JSON formatter writing to stderr.
//! `RUST_LOG`, when set, takes precedence over the configured level.
//!
//! ```no_run
//! use tablebeam::logging::{LogConfig, LogFormat, init_logging};
//!
//! # fn main() -> anyhow::Result<()> {
//! init_logging(&LogConfig::default().with_format(LogFormat::Json))?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Minimum level of events that are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub include_thread_ids: bool,
}

impl LogConfig {
    /// `debug` with thread ids when `verbose`, `info` otherwise.
    #[must_use]
    pub fn verbose(verbose: bool) -> Self {
        if verbose {
            Self {
                level: LogLevel::Debug,
                include_thread_ids: true,
                ..Self::default()
            }
        } else {
            Self::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.level.to_string()).context("build log filter"),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;
    let layer = subscriber_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(config.include_thread_ids);

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .context("install log subscriber")?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
            .context("install log subscriber")?,
    }
    Ok(())
}
