//! Error types for report rendering.

use thiserror::Error;

/// Errors raised while rendering reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialising a report snapshot failed.
    #[error("failed to serialize report")]
    Serialize {
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result alias for report operations.
pub type ReportResult<T> = Result<T, ReportError>;
