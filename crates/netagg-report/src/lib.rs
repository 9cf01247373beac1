#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Build reports: the per-run structured log, its lifecycle status, and the
//! repository tracking the last, last complete, and last successful runs.
//!
//! Layout: `message.rs` (stage/severity tagged messages), `stats.rs` (stage
//! timings), `report.rs` (`Report` + `ReportSink` dispatcher), `repository.rs`
//! (`ReportRepository`).

pub mod error;
pub mod message;
pub mod report;
pub mod repository;
pub mod stats;

pub use error::{ReportError, ReportResult};
pub use message::{ReportMessage, Severity, Stage};
pub use report::{BuildStatus, Report, ReportDispatcher, ReportSink, ReportSnapshot};
pub use repository::{ReportPointers, ReportRepository};
pub use stats::PerformanceStats;
