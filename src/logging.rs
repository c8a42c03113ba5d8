//! Console and rolling-file logging setup.
//!
//! Hosts call [`init_logging`] once at startup and keep the returned guard
//! alive; dropping it stops the background file writer.

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const LOG_FILE_NAME: &str = "volume_profile_engine.log";

fn default_level() -> String {
    "info,volume_profile_engine=info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_true() -> bool {
    true
}

/// Logging configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives (e.g. "info,volume_profile_engine=debug"); `RUST_LOG` wins when set
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Write a rolling log file next to the console output
    #[serde(default)]
    pub file_logging: bool,
    /// JSON lines in the log file instead of plain text
    #[serde(default = "default_true")]
    pub json: bool,
    #[serde(default)]
    pub rotation: LogRotation,
    #[serde(default = "default_true")]
    pub console_timestamps: bool,
}

/// Log rotation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: default_log_dir(),
            file_logging: false,
            json: true,
            rotation: LogRotation::Daily,
            console_timestamps: true,
        }
    }
}

impl LoggingConfig {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    fn file_appender(&self) -> RollingFileAppender {
        match self.rotation {
            LogRotation::Daily => rolling::daily(&self.log_dir, LOG_FILE_NAME),
            LogRotation::Hourly => rolling::hourly(&self.log_dir, LOG_FILE_NAME),
            LogRotation::Never => rolling::never(&self.log_dir, LOG_FILE_NAME),
        }
    }
}

/// Install the global subscriber: console always, rolling file when enabled.
///
/// Returns the file writer guard, if a file layer was installed.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_timer(if config.console_timestamps {
            ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string())
        } else {
            ChronoUtc::new(String::new())
        })
        .with_filter(config.env_filter());

    let (file_layer, guard) = if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
        let (file_writer, guard) = non_blocking(config.file_appender());

        let layer = if config.json {
            fmt::layer()
                .json()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
                .with_filter(config.env_filter())
                .boxed()
        } else {
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_timer(ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string()))
                .with_filter(config.env_filter())
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        level = %config.level,
        file_logging = config.file_logging,
        log_dir = %config.log_dir,
        rotation = ?config.rotation,
        "Logging initialized"
    );
    Ok(guard)
}

/// Console-only logging for tests and small hosts
pub fn init_simple_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(default_level()))
        .try_init()?;
    Ok(())
}
