//! Tracing setup for Homecast
//!
//! Dual output: console logs at the level the user picked, and full trace logs
//! written to disk so a failed "play" can be diagnosed after the fact.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File the most recent run's trace log is written to, inside the logs directory.
pub const LOG_FILE_NAME: &str = "homecast-last-run.log";

/// Initialize tracing with dual output: console (user level) + file (full trace)
///
/// # Arguments
/// * `console_level` - Log level for console output
/// * `logs_dir` - Directory to write trace logs (defaults to "./logs")
///
/// # File Output
/// Writes complete logs to `logs/homecast-last-run.log`, overwriting the previous run.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If the logs directory cannot be created or the log file cannot be opened
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    // Console layer - RUST_LOG wins over the CLI flag when set
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        console = %console_level,
        log_file = %log_file_path.display(),
        "Tracing initialized"
    );

    Ok(())
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    #[default]
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts the CLI log level to a tracing Level.
    ///
    /// # Examples
    /// ```
    /// use homecast_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(CliLogLevel::Error),
            "warn" => Ok(CliLogLevel::Warn),
            "info" => Ok(CliLogLevel::Info),
            "debug" => Ok(CliLogLevel::Debug),
            "trace" => Ok(CliLogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing_roundtrips_display() {
        for level in [
            CliLogLevel::Error,
            CliLogLevel::Warn,
            CliLogLevel::Info,
            CliLogLevel::Debug,
            CliLogLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<CliLogLevel>(), Ok(level));
        }
        assert_eq!("DEBUG".parse::<CliLogLevel>(), Ok(CliLogLevel::Debug));
        assert!("verbose".parse::<CliLogLevel>().is_err());
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        // Another test may already have installed a global subscriber
        let _ = init_tracing(Level::WARN, Some(dir.path()));
        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }
}
