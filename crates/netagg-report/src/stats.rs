//! Wall-clock timings of a build's stages.

use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::info;

/// Durations of each pipeline stage and of the whole build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceStats {
    /// Fetch stage.
    #[serde(serialize_with = "human_duration")]
    pub data_fetching_duration: Duration,
    /// Index stage.
    #[serde(serialize_with = "human_duration")]
    pub precompute_duration: Duration,
    /// Compile stage.
    #[serde(serialize_with = "human_duration")]
    pub compute_duration: Duration,
    /// Whole build.
    #[serde(serialize_with = "human_duration")]
    pub build_duration: Duration,
}

impl PerformanceStats {
    /// Emit the timings as structured log lines.
    pub fn log(&self) {
        info!(stats = "data fetching duration", value = ?self.data_fetching_duration);
        info!(stats = "precompute duration", value = ?self.precompute_duration);
        info!(stats = "compute duration", value = ?self.compute_duration);
        info!(stats = "total build duration", value = ?self.build_duration);
    }
}

fn human_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{duration:?}"))
}
