//! Stage and severity tagged messages produced while a build runs.

use std::fmt::{self, Display, Formatter};

use serde::{Serialize, Serializer};

/// Pipeline stage that produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Scheduler-level messages.
    Global,
    /// Source fetching.
    Fetch,
    /// Grouping records per device.
    Index,
    /// Device compilation.
    Compile,
}

impl Stage {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Fetch => "fetch",
            Self::Index => "index",
            Self::Compile => "compile",
        }
    }
}

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational.
    Info,
    /// Degraded but tolerated.
    Warning,
    /// Failure.
    Error,
}

impl Severity {
    /// Short label used when rendering messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One entry in a build report. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMessage {
    /// Producing stage.
    pub stage: Stage,
    /// Severity.
    pub severity: Severity,
    /// Free text.
    pub text: String,
}

impl ReportMessage {
    /// Build a message.
    #[must_use]
    pub fn new(stage: Stage, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            stage,
            severity,
            text: text.into(),
        }
    }
}

impl Display for ReportMessage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} - {}", self.severity, self.text)
    }
}

/// Messages render as `"<severity> - <text>"` in report documents.
impl Serialize for ReportMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
