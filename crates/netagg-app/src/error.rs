//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: netagg_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: netagg_telemetry::TelemetryError,
    },
    /// HTTP client construction failed.
    #[error("http client operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// Listener or server IO failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Address involved in the failure.
        addr: SocketAddr,
        /// Source IO error.
        source: io::Error,
    },
    /// The scheduler task ended abnormally.
    #[error("build scheduler task failed")]
    Scheduler {
        /// Join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: netagg_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: netagg_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn http(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Http { operation, source }
    }

    pub(crate) const fn io(operation: &'static str, addr: SocketAddr, source: io::Error) -> Self {
        Self::Io {
            operation,
            addr,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn helpers_keep_operation_and_source() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);
        let err = AppError::io("listener.bind", addr, io::Error::other("in use"));
        assert!(matches!(
            err,
            AppError::Io {
                operation: "listener.bind",
                ..
            }
        ));
        assert_eq!(err.to_string(), "io operation failed");
        assert!(err.source().is_some());

        let err = AppError::config(
            "config.load",
            netagg_config::ConfigError::InvalidField {
                field: "api.listen_port",
                value: Some("0".to_string()),
                reason: "must be between 1 and 65535",
            },
        );
        assert!(matches!(err, AppError::Config { .. }));
    }
}
