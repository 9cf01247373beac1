//! Read surface over the stores the scheduler publishes to.

use std::sync::Arc;

use netagg_report::{Report, ReportRepository};
use netagg_telemetry::Metrics;

use crate::snapshot::{CompiledDevice, DeviceSnapshot, SnapshotStore};
use crate::trigger::{BuildTrigger, TriggerResponse};

/// Cloneable handle given to API layers.
///
/// Every accessor returns an immutable view, so a caller holding one never
/// observes a later build.
#[derive(Clone)]
pub struct BuildHandles {
    snapshots: Arc<SnapshotStore>,
    reports: ReportRepository,
    trigger: BuildTrigger,
    metrics: Metrics,
}

impl BuildHandles {
    pub(crate) const fn new(
        snapshots: Arc<SnapshotStore>,
        reports: ReportRepository,
        trigger: BuildTrigger,
        metrics: Metrics,
    ) -> Self {
        Self {
            snapshots,
            reports,
            trigger,
            metrics,
        }
    }

    /// Live snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.snapshots.get_all()
    }

    /// Outcome for `hostname` in the live snapshot.
    #[must_use]
    pub fn device(&self, hostname: &str) -> Option<CompiledDevice> {
        self.snapshots.get(hostname)
    }

    /// Current or most recent report.
    #[must_use]
    pub fn last_report(&self) -> Option<Arc<Report>> {
        self.reports.last()
    }

    /// Most recent finished report.
    #[must_use]
    pub fn last_complete_report(&self) -> Option<Arc<Report>> {
        self.reports.last_complete()
    }

    /// Most recent successful report.
    #[must_use]
    pub fn last_successful_report(&self) -> Option<Arc<Report>> {
        self.reports.last_successful()
    }

    /// Whether a build has ever succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.reports.is_ready()
    }

    /// Ask the scheduler for a build.
    pub fn request_build(&self) -> TriggerResponse {
        self.trigger.request_build()
    }

    /// Build metrics.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
