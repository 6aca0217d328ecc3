//! Context configuration.

use thiserror::Error;

pub use crate::logging::{LogConfig, LogFormat, LogLevel};

/// Errors parsing configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),
}

/// Configuration of a [`Context`](crate::Context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Name of the universal root reference type. Classes without an
    /// explicit base derive from it and value types box to it.
    pub root_type: Option<String>,
    /// Pre-register `bool`, `char`, `int`, `long`, `float`, `double`,
    /// `void` and the sealed `string` class.
    pub register_primitives: bool,
    /// Skip the covariant array write check when the static element type
    /// is sealed or value-kind.
    pub elide_sealed_variance_checks: bool,
    /// Check capability and kind constraints when instantiating generics.
    pub enforce_generic_constraints: bool,
    /// Logging used by [`logging::init`](crate::logging::init).
    pub log: LogConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            root_type: Some("object".to_string()),
            register_primitives: true,
            elide_sealed_variance_checks: true,
            enforce_generic_constraints: true,
            log: LogConfig::default(),
        }
    }
}

impl ContextConfig {
    /// Use a different root type name.
    pub fn with_root_type(mut self, name: impl Into<String>) -> Self {
        self.root_type = Some(name.into());
        self
    }

    /// Run without a root type.
    pub fn without_root_type(mut self) -> Self {
        self.root_type = None;
        self
    }

    /// Enable or disable primitive registration.
    pub fn with_primitives(mut self, enabled: bool) -> Self {
        self.register_primitives = enabled;
        self
    }

    /// Enable or disable eliding covariance checks for sealed element types.
    pub fn with_variance_elision(mut self, enabled: bool) -> Self {
        self.elide_sealed_variance_checks = enabled;
        self
    }

    /// Enable or disable generic constraint checks.
    pub fn with_generic_constraints(mut self, enabled: bool) -> Self {
        self.enforce_generic_constraints = enabled;
        self
    }

    /// Set the logging configuration.
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}
