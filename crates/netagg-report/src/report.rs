//! Per-build structured log.
//!
//! A [`Report`] is created when a run starts, receives messages from every
//! stage through cloned [`ReportSink`]s, and is frozen once the owning run has
//! dropped its sinks and joined the [`ReportDispatcher`]. Messages arriving after
//! the freeze are discarded.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};
use crate::message::{ReportMessage, Severity, Stage};
use crate::stats::PerformanceStats;

/// Lifecycle status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BuildStatus {
    /// Created, not started.
    #[default]
    #[serde(rename = "pending")]
    Pending,
    /// Pipeline running.
    #[serde(rename = "build in progress")]
    InProgress,
    /// Every stage succeeded.
    #[serde(rename = "build successful")]
    Success,
    /// Aborted or degraded.
    #[serde(rename = "build failed")]
    Failed,
}

impl BuildStatus {
    /// Label used in reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "build in progress",
            Self::Success => "build successful",
            Self::Failed => "build failed",
        }
    }
}

#[derive(Debug, Default)]
struct ReportState {
    end_time: Option<DateTime<Utc>>,
    status: BuildStatus,
    logs: BTreeMap<Stage, Vec<ReportMessage>>,
    performance: PerformanceStats,
    frozen: bool,
}

/// The record of one pipeline run.
#[derive(Debug)]
pub struct Report {
    id: Uuid,
    start_time: DateTime<Utc>,
    state: Mutex<ReportState>,
}

/// Point-in-time copy of a [`Report`], as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSnapshot {
    /// Build identifier.
    pub build_id: Uuid,
    /// Run start.
    pub start_time: DateTime<Utc>,
    /// Run end, once frozen.
    pub end_time: Option<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: BuildStatus,
    /// Messages grouped by stage, in arrival order.
    pub logs: BTreeMap<Stage, Vec<ReportMessage>>,
    /// Stage timings.
    pub performance: PerformanceStats,
}

impl Report {
    /// Create a pending report stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time: Utc::now(),
            state: Mutex::new(ReportState::default()),
        }
    }

    /// Build identifier, also used as the `build_id` log field.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message and mirror it to `tracing` at its severity.
    ///
    /// Returns `false` when the report is already frozen and the message was dropped.
    pub fn record(&self, message: ReportMessage) -> bool {
        let mut state = self.state();
        if state.frozen {
            debug!(build_id = %self.id, text = %message.text, "report frozen; message dropped");
            return false;
        }
        let stage = message.stage.as_str();
        match message.severity {
            Severity::Info => info!(build_id = %self.id, stage, "{}", message.text),
            Severity::Warning => warn!(build_id = %self.id, stage, "{}", message.text),
            Severity::Error => error!(build_id = %self.id, stage, "{}", message.text),
        }
        state.logs.entry(message.stage).or_default().push(message);
        true
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> BuildStatus {
        self.state().status
    }

    /// Move the report to `status`. Ignored once frozen.
    pub fn set_status(&self, status: BuildStatus) {
        let mut state = self.state();
        if !state.frozen {
            state.status = status;
        }
    }

    /// Attach stage timings. Ignored once frozen.
    pub fn set_performance(&self, performance: PerformanceStats) {
        let mut state = self.state();
        if !state.frozen {
            state.performance = performance;
        }
    }

    /// Stamp the end time and reject further writes.
    pub fn freeze(&self) {
        let mut state = self.state();
        if !state.frozen {
            state.end_time = Some(Utc::now());
            state.frozen = true;
        }
    }

    /// Whether [`Report::freeze`] has run.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state().frozen
    }

    /// All messages, stage by stage in pipeline order.
    #[must_use]
    pub fn messages(&self) -> Vec<ReportMessage> {
        self.state().logs.values().flatten().cloned().collect()
    }

    /// Consistent copy of the report for serialisation.
    #[must_use]
    pub fn snapshot(&self) -> ReportSnapshot {
        let state = self.state();
        ReportSnapshot {
            build_id: self.id,
            start_time: self.start_time,
            end_time: state.end_time,
            status: state.status,
            logs: state.logs.clone(),
            performance: state.performance,
        }
    }

    /// Render the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialize`] if serialisation fails.
    pub fn to_json(&self) -> ReportResult<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|source| ReportError::Serialize { source })
    }

    /// Open a message channel into this report.
    ///
    /// The returned sink may be cloned into any number of tasks; the dispatcher
    /// drains it until every sink has been dropped. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn attach(self: &Arc<Self>) -> (ReportSink, ReportDispatcher) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ReportMessage>();
        let report = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut recorded = 0_usize;
            while let Some(message) = receiver.recv().await {
                if report.record(message) {
                    recorded += 1;
                }
            }
            recorded
        });
        (
            ReportSink {
                build_id: self.id,
                sender,
            },
            ReportDispatcher { handle },
        )
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable writer handle feeding a [`Report`].
///
/// Emitting never blocks: messages are queued on an unbounded channel and
/// appended by the dispatcher task.
#[derive(Debug, Clone)]
pub struct ReportSink {
    build_id: Uuid,
    sender: mpsc::UnboundedSender<ReportMessage>,
}

impl ReportSink {
    /// Queue a message for the report.
    pub fn emit(&self, stage: Stage, severity: Severity, text: impl Into<String>) {
        let message = ReportMessage::new(stage, severity, text);
        if let Err(err) = self.sender.send(message) {
            warn!(
                build_id = %self.build_id,
                text = %err.0.text,
                "report dispatcher stopped; message dropped"
            );
        }
    }

    /// Queue an info message.
    pub fn info(&self, stage: Stage, text: impl Into<String>) {
        self.emit(stage, Severity::Info, text);
    }

    /// Queue a warning.
    pub fn warning(&self, stage: Stage, text: impl Into<String>) {
        self.emit(stage, Severity::Warning, text);
    }

    /// Queue an error.
    pub fn error(&self, stage: Stage, text: impl Into<String>) {
        self.emit(stage, Severity::Error, text);
    }
}

/// Background task appending sink messages to a report.
#[derive(Debug)]
pub struct ReportDispatcher {
    handle: JoinHandle<usize>,
}

impl ReportDispatcher {
    /// Wait for the dispatcher to drain once every sink has been dropped.
    ///
    /// Returns the number of messages recorded.
    pub async fn finish(self) -> usize {
        match self.handle.await {
            Ok(recorded) => recorded,
            Err(err) => {
                warn!(error = %err, "report dispatcher task failed");
                0
            }
        }
    }
}
