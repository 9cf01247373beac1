#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Telemetry primitives shared across the workspace.
//!
//! This crate centralises logging setup and the Prometheus registry describing
//! build outcomes so the scheduler and the read surface share one story.

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{LogFormat, LoggingConfig, build_version, init_logging};
pub use metrics::{BuildDurations, Metrics, MetricsSnapshot};
