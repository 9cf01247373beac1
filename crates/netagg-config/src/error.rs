//! Error types for configuration loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("failed to read configuration file")]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The settings file could not be parsed.
    #[error("failed to parse configuration file")]
    Parse {
        /// Path of the settings file.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Dotted field name that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidField {
            field,
            value: Some(value.into()),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_helper_keeps_context() {
        let err = ConfigError::invalid("api.listen_port", "0", "must be between 1 and 65535");
        match err {
            ConfigError::InvalidField {
                field,
                value,
                reason,
            } => {
                assert_eq!(field, "api.listen_port");
                assert_eq!(value.as_deref(), Some("0"));
                assert_eq!(reason, "must be between 1 and 65535");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(
            ConfigError::invalid("build.interval_secs", "0", "must be positive").to_string(),
            "invalid configuration field"
        );
    }
}
