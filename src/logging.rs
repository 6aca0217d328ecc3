//! Logging setup.
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to the embedding application. [`init`] installs a `tracing-subscriber`
//! fmt subscriber once per process.
//!
//! The level comes from [`LogConfig`], overridden by the `POLYDISPATCH_LOG`
//! environment variable when set (any `EnvFilter` directive, e.g.
//! `polydispatch_resolver=trace`).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

use crate::config::ConfigError;

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "POLYDISPATCH_LOG";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "POLYDISPATCH_LOG_FORMAT";

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" | "compact" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" | "err" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" | "verbose" => Ok(Self::Trace),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

/// Log level and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LogConfig {
    /// Set the level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Apply the format override from the environment, if present and valid.
    pub fn with_env_overrides(self) -> Self {
        match std::env::var(LOG_FORMAT_ENV).ok().map(|v| v.parse()) {
            Some(Ok(format)) => self.with_format(format),
            _ => self,
        }
    }
}

/// Install the global subscriber. Returns false if one was already
/// installed by an earlier call (or by the host application).
pub fn init(config: &LogConfig) -> bool {
    static INITIALISED: OnceLock<bool> = OnceLock::new();

    *INITIALISED.get_or_init(|| {
        let config = config.with_env_overrides();
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

        let builder = tracing_fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true);

        match config.format {
            LogFormat::Json => {
                tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
            }
            LogFormat::Text => {
                tracing::subscriber::set_global_default(builder.compact().finish()).is_ok()
            }
        }
    })
}
