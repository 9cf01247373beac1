//! Build Scheduler: runs the pipeline on an interval or on request.
//!
//! One scheduler task drives every build, so at most one run is active at a
//! time. Each run moves its report through `InProgress` to `Success` or
//! `Failed` and advances the repository pointers only once the report is
//! frozen.

use std::sync::Arc;
use std::time::Duration;

use netagg_report::{BuildStatus, Report, ReportRepository, Stage};
use netagg_telemetry::{BuildDurations, Metrics};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::handles::BuildHandles;
use crate::pipeline::{BuildError, BuildRun, Pipeline};
use crate::snapshot::SnapshotStore;
use crate::trigger::{TriggerReceiver, build_trigger};

/// Why the scheduler woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Tick,
    Requested,
    Shutdown,
}

/// Owner of the build loop.
pub struct Scheduler {
    pipeline: Pipeline,
    reports: ReportRepository,
    snapshots: Arc<SnapshotStore>,
    metrics: Metrics,
    triggers: TriggerReceiver,
    triggers_open: bool,
    interval: Duration,
}

impl Scheduler {
    /// Scheduler plus the handles serving its output.
    #[must_use]
    pub fn new(pipeline: Pipeline, metrics: Metrics, interval: Duration) -> (Self, BuildHandles) {
        let reports = ReportRepository::new();
        let snapshots = Arc::new(SnapshotStore::new());
        let (trigger, triggers) = build_trigger();
        let handles = BuildHandles::new(
            Arc::clone(&snapshots),
            reports.clone(),
            trigger,
            metrics.clone(),
        );
        let scheduler = Self {
            pipeline,
            reports,
            snapshots,
            metrics,
            triggers,
            triggers_open: true,
            interval,
        };
        (scheduler, handles)
    }

    /// Build immediately, then on every tick or request until `shutdown`
    /// turns true. A running build is never interrupted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.interval, "build scheduler started");
        while !*shutdown.borrow() {
            self.run_once().await;
            if self.wait(&mut shutdown).await == Wake::Shutdown {
                break;
            }
        }
        info!("build scheduler stopped");
    }

    async fn wait(&mut self, shutdown: &mut watch::Receiver<bool>) -> Wake {
        let tick = tokio::time::sleep(self.interval);
        tokio::pin!(tick);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Wake::Shutdown;
                    }
                }
                () = &mut tick => {
                    debug!("build interval elapsed");
                    return Wake::Tick;
                }
                received = self.triggers.recv(), if self.triggers_open => {
                    if received.is_some() {
                        info!("build requested");
                        return Wake::Requested;
                    }
                    self.triggers_open = false;
                }
            }
        }
    }

    /// Run one build and publish its outcome.
    pub async fn run_once(&mut self) -> Arc<Report> {
        let report = self.reports.start_new_report();
        let build_id = report.id();
        info!(%build_id, "build started");

        let (sink, dispatcher) = report.attach();
        let BuildRun { stats, outcome } = self.pipeline.run(&sink).await;
        let succeeded = match outcome {
            Ok(snapshot) => {
                self.metrics.set_built_devices(snapshot.built_count());
                self.snapshots.publish(snapshot);
                sink.info(Stage::Global, "build successful");
                true
            }
            Err(BuildError::CompileDegraded { snapshot, failed }) => {
                self.snapshots.publish(snapshot);
                sink.warning(
                    Stage::Global,
                    format!("build failed for {} devices", failed.len()),
                );
                false
            }
            Err(err @ BuildError::FetchAborted { .. }) => {
                warn!(%build_id, error = %err, "previous snapshot kept");
                sink.warning(
                    Stage::Global,
                    "build failed, the previous snapshot is still served",
                );
                false
            }
        };
        drop(sink);
        let recorded = dispatcher.finish().await;

        let status = if succeeded {
            BuildStatus::Success
        } else {
            BuildStatus::Failed
        };
        report.set_performance(stats);
        report.set_status(status);
        report.freeze();
        self.reports.complete(&report);
        if succeeded {
            self.metrics.build_successful();
        } else {
            self.metrics.build_failed();
        }
        self.metrics.observe_build_durations(BuildDurations {
            data_fetching: stats.data_fetching_duration,
            precompute: stats.precompute_duration,
            compute: stats.compute_duration,
            total: stats.build_duration,
        });

        info!(
            %build_id,
            status = status.as_str(),
            messages = recorded,
            duration = ?stats.build_duration,
            "build finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineSettings;
    use crate::snapshot::CompiledDevice;
    use crate::testing::{ScriptedCompiler, ScriptedSource, inventory};
    use crate::trigger::TriggerResponse;
    use anyhow::{Result, anyhow};
    use netagg_inventory::SourceCategory;
    use netagg_report::Severity;
    use tokio::sync::Semaphore;

    fn scheduler(source: ScriptedSource, compiler: ScriptedCompiler) -> Result<(Scheduler, BuildHandles)> {
        let pipeline = Pipeline::new(
            Arc::new(source),
            Arc::new(compiler),
            PipelineSettings::default(),
        );
        Ok(Scheduler::new(pipeline, Metrics::new("test")?, Duration::from_secs(3600)))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(|_| anyhow!("condition not reached in time"))
    }

    #[tokio::test]
    async fn successful_build_publishes_and_becomes_ready() -> Result<()> {
        let (mut scheduler, handles) =
            scheduler(ScriptedSource::new(inventory(&["a", "b"])), ScriptedCompiler::default())?;
        assert!(!handles.is_ready());
        assert!(handles.snapshot().is_empty());

        let report = scheduler.run_once().await;
        assert_eq!(report.status(), BuildStatus::Success);
        assert!(report.is_frozen());
        assert!(handles.is_ready());
        assert_eq!(handles.snapshot().built_count(), 2);
        assert!(handles.device("a").is_some_and(|device| device.is_built()));
        assert_eq!(handles.metrics().snapshot().successful_builds, 1);
        assert_eq!(handles.metrics().snapshot().built_devices, 2);
        Ok(())
    }

    #[tokio::test]
    async fn critical_failure_keeps_previous_snapshot() -> Result<()> {
        let source = ScriptedSource::new(inventory(&["a", "b"]));
        let (mut scheduler, handles) = scheduler(source.clone(), ScriptedCompiler::default())?;
        scheduler.run_once().await;
        let before = handles.snapshot();

        source.set_failing(SourceCategory::BgpSessions, true);
        let report = scheduler.run_once().await;

        assert_eq!(report.status(), BuildStatus::Failed);
        assert!(Arc::ptr_eq(&before, &handles.snapshot()));
        assert_eq!(
            handles.last_complete_report().map(|report| report.id()),
            Some(report.id())
        );
        assert_ne!(
            handles.last_successful_report().map(|report| report.id()),
            Some(report.id())
        );
        assert_eq!(handles.metrics().snapshot().build_status, 0);
        Ok(())
    }

    #[tokio::test]
    async fn readiness_survives_later_failures() -> Result<()> {
        let source = ScriptedSource::new(inventory(&["a"])).failing(SourceCategory::Devices);
        let (mut scheduler, handles) = scheduler(source.clone(), ScriptedCompiler::default())?;

        scheduler.run_once().await;
        assert!(!handles.is_ready());
        assert!(handles.last_successful_report().is_none());

        source.set_failing(SourceCategory::Devices, false);
        let good = scheduler.run_once().await;
        assert!(handles.is_ready());

        source.set_failing(SourceCategory::Devices, true);
        scheduler.run_once().await;
        scheduler.run_once().await;
        assert!(handles.is_ready());
        assert_eq!(
            handles.last_successful_report().map(|report| report.id()),
            Some(good.id())
        );
        Ok(())
    }

    #[tokio::test]
    async fn device_missing_sessions_is_served_as_failure_marker() -> Result<()> {
        let mut data = inventory(&["A", "B"]);
        data.bgp_sessions
            .retain(|session| session.peer_a.device.name != "B");
        let (mut scheduler, handles) =
            scheduler(ScriptedSource::new(data), ScriptedCompiler::default())?;

        scheduler.run_once().await;

        let snapshot = handles.snapshot();
        assert!(snapshot.get("A").is_some_and(CompiledDevice::is_built));
        assert!(matches!(snapshot.get("B"), Some(CompiledDevice::Failed { .. })));
        let report = handles
            .last_complete_report()
            .ok_or_else(|| anyhow!("missing complete report"))?;
        assert_eq!(report.status(), BuildStatus::Failed);
        let errors: Vec<_> = report
            .messages()
            .into_iter()
            .filter(|message| message.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].text.ends_with("for B"));
        assert!(!handles.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn repeated_compile_failure_never_becomes_successful() -> Result<()> {
        let (mut scheduler, handles) = scheduler(
            ScriptedSource::new(inventory(&["A", "B"])),
            ScriptedCompiler::default().failing_for("B"),
        )?;

        let mut completed = Vec::new();
        for _ in 0..3 {
            scheduler.run_once().await;
            let complete = handles
                .last_complete_report()
                .ok_or_else(|| anyhow!("missing complete report"))?;
            completed.push(complete.id());

            assert!(handles.last_successful_report().is_none());
            let snapshot = handles.snapshot();
            assert!(snapshot.get("A").is_some_and(CompiledDevice::is_built));
            assert!(matches!(snapshot.get("B"), Some(CompiledDevice::Failed { .. })));
        }
        completed.dedup();
        assert_eq!(completed.len(), 3);
        assert_eq!(handles.metrics().snapshot().failed_builds, 3);
        Ok(())
    }

    #[tokio::test]
    async fn requests_during_a_build_coalesce_into_one_run() -> Result<()> {
        let gate = Arc::new(Semaphore::new(0));
        let source = ScriptedSource::new(inventory(&["a"])).gated(Arc::clone(&gate));
        let (scheduler, handles) = scheduler(source.clone(), ScriptedCompiler::default())?;
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(scheduler.run(shutdown));

        wait_until(|| source.runs() == 1).await?;
        assert_eq!(handles.request_build(), TriggerResponse::Accepted);
        for _ in 0..4 {
            assert_eq!(handles.request_build(), TriggerResponse::AlreadyPending);
        }

        gate.add_permits(16);
        wait_until(|| {
            source.runs() == 2
                && handles
                    .last_complete_report()
                    .zip(handles.last_report())
                    .is_some_and(|(complete, last)| complete.id() == last.id())
        })
        .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.runs(), 2);

        stop.send(true)?;
        task.await?;
        assert_eq!(handles.request_build(), TriggerResponse::SchedulerStopped);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_before_start_skips_building() -> Result<()> {
        let source = ScriptedSource::new(inventory(&["a"]));
        let (scheduler, handles) = scheduler(source.clone(), ScriptedCompiler::default())?;
        let (_stop, shutdown) = watch::channel(true);

        scheduler.run(shutdown).await;
        assert_eq!(source.runs(), 0);
        assert!(handles.last_report().is_none());
        Ok(())
    }
}
