//! Tracking of the last, last complete, and last successful reports.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::report::{BuildStatus, Report};

/// The three report references. Replaced wholesale on every transition.
#[derive(Debug, Clone, Default)]
pub struct ReportPointers {
    /// Current or most recent report, possibly still being written.
    pub last: Option<Arc<Report>>,
    /// Most recent finished report, whatever its outcome.
    pub last_complete: Option<Arc<Report>>,
    /// Most recent report with a successful status.
    pub last_successful: Option<Arc<Report>>,
}

/// Shared holder of [`ReportPointers`]. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct ReportRepository {
    pointers: Arc<RwLock<Arc<ReportPointers>>>,
}

impl ReportRepository {
    /// Empty repository: no reports, not ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<ReportPointers> {
        Arc::clone(&self.pointers.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update(&self, change: impl FnOnce(&mut ReportPointers)) {
        let mut guard = self.pointers.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = ReportPointers::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }

    /// Create a report for a new run in the in-progress state and make it `last`.
    #[must_use]
    pub fn start_new_report(&self) -> Arc<Report> {
        let report = Arc::new(Report::new());
        report.set_status(BuildStatus::InProgress);
        debug!(build_id = %report.id(), "new build report started");
        let last = Arc::clone(&report);
        self.update(move |pointers| pointers.last = Some(last));
        report
    }

    /// Advance `last_complete` to `report`, and `last_successful` too when its
    /// status is [`BuildStatus::Success`]. Both move in one swap.
    pub fn complete(&self, report: &Arc<Report>) {
        let succeeded = report.status() == BuildStatus::Success;
        let report = Arc::clone(report);
        self.update(move |pointers| {
            if succeeded {
                pointers.last_successful = Some(Arc::clone(&report));
            }
            pointers.last_complete = Some(report);
        });
    }

    /// Consistent view of all three references.
    #[must_use]
    pub fn pointers(&self) -> Arc<ReportPointers> {
        self.current()
    }

    /// Current or most recent report.
    #[must_use]
    pub fn last(&self) -> Option<Arc<Report>> {
        self.current().last.clone()
    }

    /// Most recent finished report.
    #[must_use]
    pub fn last_complete(&self) -> Option<Arc<Report>> {
        self.current().last_complete.clone()
    }

    /// Most recent successful report.
    #[must_use]
    pub fn last_successful(&self) -> Option<Arc<Report>> {
        self.current().last_successful.clone()
    }

    /// Ready once any run has fully succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current().last_successful.is_some()
    }
}
