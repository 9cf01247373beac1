//! Pipeline Orchestrator: fetch, index, then compile.
//!
//! Stages run strictly one after another. Fetch fans out one task per source
//! category and compile fans out one blocking task per device; each stage
//! joins every task it started before the next stage begins. Task outcomes are
//! collected and reduced after the join, so no state is shared between tasks
//! other than the report sink.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use netagg_config::{BuildConfig, SourceCategory, SourcePolicy};
use netagg_inventory::{
    AssetBatch, AssetSource, DeviceCompiler, DeviceIdentity, DeviceView, FetchedAssets,
    MissingDeviceData,
};
use netagg_report::{PerformanceStats, ReportSink, Stage};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::snapshot::{CompiledDevice, DeviceSnapshot};

/// Settings consumed by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Abort the run when any device is missing required data.
    pub all_devices_must_build: bool,
    /// Load-bearing versus best-effort categories.
    pub policy: SourcePolicy,
    /// Upper bound on each fetch task.
    pub source_timeout: Option<Duration>,
}

impl From<&BuildConfig> for PipelineSettings {
    fn from(config: &BuildConfig) -> Self {
        Self {
            all_devices_must_build: config.all_devices_must_build,
            policy: config.source_policy(),
            source_timeout: config.source_timeout(),
        }
    }
}

/// Why a run stopped before compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Load-bearing categories failed to fetch.
    CriticalSource {
        /// Failed categories.
        categories: Vec<SourceCategory>,
    },
    /// Devices lacked required data while every device must build.
    AllDevicesMustBuild {
        /// Devices missing data.
        missing: Vec<DeviceIdentity>,
    },
}

impl Display for AbortReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CriticalSource { categories } => {
                formatter.write_str("load-bearing sources failed:")?;
                for category in categories {
                    write!(formatter, " {category}")?;
                }
                Ok(())
            }
            Self::AllDevicesMustBuild { missing } => {
                write!(formatter, "{} devices are missing required data", missing.len())
            }
        }
    }
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Nothing is published; the previous snapshot stays live.
    #[error("build aborted before compilation")]
    FetchAborted {
        /// Cause.
        reason: AbortReason,
    },
    /// Some devices failed; the partial snapshot is still published.
    #[error("some devices failed to build")]
    CompileDegraded {
        /// Snapshot with failure markers for the failed devices.
        snapshot: DeviceSnapshot,
        /// Failed devices, in hostname order.
        failed: Vec<DeviceIdentity>,
    },
}

impl BuildError {
    /// Snapshot that should still be published, if any.
    #[must_use]
    pub fn into_partial_snapshot(self) -> Option<DeviceSnapshot> {
        match self {
            Self::FetchAborted { .. } => None,
            Self::CompileDegraded { snapshot, .. } => Some(snapshot),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct BuildRun {
    /// Stage timings.
    pub stats: PerformanceStats,
    /// Snapshot or run-level failure.
    pub outcome: Result<DeviceSnapshot, BuildError>,
}

/// Index stage output.
struct Prepared {
    views: Vec<Arc<DeviceView>>,
    missing: Vec<MissingDeviceData>,
}

type FetchOutcome = (SourceCategory, Result<FetchedAssets, String>);

/// Fetch, index and compile wired to one source and one compiler.
pub struct Pipeline {
    source: Arc<dyn AssetSource>,
    compiler: Arc<dyn DeviceCompiler>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Assemble a pipeline.
    #[must_use]
    pub fn new(
        source: Arc<dyn AssetSource>,
        compiler: Arc<dyn DeviceCompiler>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            compiler,
            settings,
        }
    }

    /// Run every stage, writing progress to `sink`.
    pub async fn run(&self, sink: &ReportSink) -> BuildRun {
        let started = Instant::now();
        let mut stats = PerformanceStats::default();
        let outcome = self.run_stages(sink, &mut stats).await;
        stats.build_duration = started.elapsed();
        stats.log();
        BuildRun { stats, outcome }
    }

    async fn run_stages(
        &self,
        sink: &ReportSink,
        stats: &mut PerformanceStats,
    ) -> Result<DeviceSnapshot, BuildError> {
        let started = Instant::now();
        let batch = self.fetch(sink).await;
        stats.data_fetching_duration = started.elapsed();
        let batch = batch?;

        let started = Instant::now();
        let prepared = self.index(batch, sink);
        stats.precompute_duration = started.elapsed();
        let prepared = prepared?;

        let started = Instant::now();
        let compiled = self.compile(prepared, sink).await;
        stats.compute_duration = started.elapsed();
        compiled
    }

    async fn fetch(&self, sink: &ReportSink) -> Result<AssetBatch, BuildError> {
        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
        for category in SourceCategory::ALL {
            let source = Arc::clone(&self.source);
            let sink = sink.clone();
            let load_bearing = self.settings.policy.is_load_bearing(category);
            let limit = self.settings.source_timeout;
            tasks.spawn(async move {
                let fetched = fetch_category(source.as_ref(), category, limit).await;
                if let Err(detail) = &fetched {
                    report_fetch_failure(&sink, category, load_bearing, detail);
                }
                (category, fetched)
            });
        }

        let mut pending: BTreeSet<SourceCategory> = SourceCategory::ALL.into_iter().collect();
        let mut batch = AssetBatch::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((category, fetched)) => {
                    pending.remove(&category);
                    match fetched {
                        Ok(assets) => {
                            debug!(category = %category, records = assets.len(), "category fetched");
                            batch.insert(assets);
                        }
                        Err(_) => batch.mark_missing(category),
                    }
                }
                Err(err) => warn!(error = %err, "fetch task failed to join"),
            }
        }
        for category in pending {
            let load_bearing = self.settings.policy.is_load_bearing(category);
            report_fetch_failure(sink, category, load_bearing, "fetch task panicked");
            batch.mark_missing(category);
        }

        let critical: Vec<SourceCategory> = batch
            .missing()
            .iter()
            .copied()
            .filter(|category| self.settings.policy.is_load_bearing(*category))
            .collect();
        if !critical.is_empty() {
            let reason = AbortReason::CriticalSource {
                categories: critical,
            };
            sink.error(Stage::Fetch, format!("build aborted: {reason}"));
            return Err(BuildError::FetchAborted { reason });
        }

        for (category, count) in batch.stats() {
            sink.info(Stage::Fetch, format!("found {count} {}", category.label()));
        }
        Ok(batch)
    }

    fn index(&self, batch: AssetBatch, sink: &ReportSink) -> Result<Prepared, BuildError> {
        let index = batch.index();
        let mut views = Vec::with_capacity(index.devices().len());
        let mut missing = Vec::new();
        for device in index.devices() {
            match DeviceView::assemble(device, &index, &self.settings.policy) {
                Ok(view) => views.push(Arc::new(view)),
                Err(err) => {
                    sink.error(Stage::Index, err.detail());
                    missing.push(err);
                }
            }
        }
        info!(
            devices = index.devices().len(),
            ready = views.len(),
            missing = missing.len(),
            "device views assembled"
        );

        if self.settings.all_devices_must_build && !missing.is_empty() {
            let reason = AbortReason::AllDevicesMustBuild {
                missing: missing.into_iter().map(|err| err.device).collect(),
            };
            sink.error(Stage::Index, format!("build aborted: {reason}"));
            return Err(BuildError::FetchAborted { reason });
        }
        Ok(Prepared { views, missing })
    }

    async fn compile(
        &self,
        prepared: Prepared,
        sink: &ReportSink,
    ) -> Result<DeviceSnapshot, BuildError> {
        let Prepared { views, missing } = prepared;
        let mut devices: BTreeMap<DeviceIdentity, CompiledDevice> = missing
            .into_iter()
            .map(|err| {
                let reason = err.detail();
                (err.device, CompiledDevice::failed(reason))
            })
            .collect();

        let mut tasks = JoinSet::new();
        for view in &views {
            let view = Arc::clone(view);
            let compiler = Arc::clone(&self.compiler);
            tasks.spawn_blocking(move || {
                let compiled = compiler.compile(&view);
                (view.identity.clone(), compiled)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((identity, Ok(artifact))) => {
                    debug!(device = %identity, "device compiled");
                    devices.insert(identity, CompiledDevice::Built(Arc::new(artifact)));
                }
                Ok((identity, Err(err))) => {
                    let detail = err.detail();
                    sink.error(Stage::Compile, format!("build failed for {identity}: {detail}"));
                    devices.insert(identity, CompiledDevice::failed(detail));
                }
                Err(err) => warn!(error = %err, "compile task failed to join"),
            }
        }
        for view in &views {
            if !devices.contains_key(&view.identity) {
                sink.error(
                    Stage::Compile,
                    format!("build failed for {}: compile task panicked", view.identity),
                );
                devices.insert(
                    view.identity.clone(),
                    CompiledDevice::failed("compile task panicked"),
                );
            }
        }

        let snapshot: DeviceSnapshot = devices.into_iter().collect();
        let failed: Vec<DeviceIdentity> =
            snapshot.failed_devices().into_iter().cloned().collect();
        sink.info(
            Stage::Compile,
            format!("{} of {} devices built", snapshot.built_count(), snapshot.len()),
        );
        if failed.is_empty() {
            Ok(snapshot)
        } else {
            Err(BuildError::CompileDegraded { snapshot, failed })
        }
    }
}

async fn fetch_category(
    source: &dyn AssetSource,
    category: SourceCategory,
    limit: Option<Duration>,
) -> Result<FetchedAssets, String> {
    let fetch = source.fetch(category);
    let fetched = match limit {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .map_err(|_| format!("timed out after {}s", limit.as_secs_f64()))?,
        None => fetch.await,
    };
    fetched.map_err(|err| err.detail())
}

fn report_fetch_failure(sink: &ReportSink, category: SourceCategory, load_bearing: bool, detail: &str) {
    let text = format!("{} fetching failure: {detail}", category.label());
    if load_bearing {
        sink.error(Stage::Fetch, text);
    } else {
        sink.warning(Stage::Fetch, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedCompiler, ScriptedSource, inventory};
    use netagg_config::{Criticality, SourceRule};
    use netagg_report::{Report, Severity};

    async fn run(pipeline: &Pipeline) -> (BuildRun, Arc<Report>) {
        let report = Arc::new(Report::new());
        let (sink, dispatcher) = report.attach();
        let run = pipeline.run(&sink).await;
        drop(sink);
        dispatcher.finish().await;
        (run, report)
    }

    fn pipeline(source: ScriptedSource, compiler: ScriptedCompiler, settings: PipelineSettings) -> Pipeline {
        Pipeline::new(Arc::new(source), Arc::new(compiler), settings)
    }

    #[tokio::test]
    async fn complete_data_builds_every_device() {
        let source = ScriptedSource::new(inventory(&["a", "b", "c"]));
        let (run, report) = run(&pipeline(source, ScriptedCompiler::default(), PipelineSettings::default())).await;

        let snapshot = run.outcome.ok();
        assert_eq!(snapshot.as_ref().map(DeviceSnapshot::built_count), Some(3));
        assert!(report.messages().iter().all(|m| m.severity == Severity::Info));
        assert!(
            report
                .messages()
                .iter()
                .any(|m| m.stage == Stage::Fetch && m.text == "found 3 devices")
        );
    }

    #[tokio::test]
    async fn load_bearing_failure_aborts_without_snapshot() {
        let source = ScriptedSource::new(inventory(&["a", "b"]))
            .failing(SourceCategory::PrefixLists)
            .failing(SourceCategory::Snmp);
        let compiler = ScriptedCompiler::default();
        let calls = compiler.calls();
        let (run, report) = run(&pipeline(source, compiler, PipelineSettings::default())).await;

        assert!(matches!(
            run.outcome,
            Err(BuildError::FetchAborted {
                reason: AbortReason::CriticalSource { ref categories }
            }) if categories == &vec![SourceCategory::PrefixLists]
        ));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        let messages = report.messages();
        assert!(messages.iter().any(|m| m.severity == Severity::Error
            && m.text.starts_with("prefix-lists fetching failure")));
        assert!(messages.iter().any(|m| m.severity == Severity::Warning
            && m.text.starts_with("SNMP configuration fetching failure")));
        assert!(messages.iter().all(|m| m.stage == Stage::Fetch));
    }

    #[tokio::test]
    async fn optional_best_effort_failure_only_warns() {
        let source = ScriptedSource::new(inventory(&["a", "b"])).failing(SourceCategory::BgpGlobal);
        let (run, report) = run(&pipeline(source, ScriptedCompiler::default(), PipelineSettings::default())).await;

        assert_eq!(run.outcome.ok().map(|snapshot| snapshot.built_count()), Some(2));
        let messages = report.messages();
        let warnings = messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
            .collect::<Vec<_>>();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].text.starts_with("BGP global configuration fetching failure"));
        assert!(messages.iter().all(|m| m.severity != Severity::Error));
    }

    #[tokio::test]
    async fn failed_required_best_effort_source_marks_every_device() {
        let source = ScriptedSource::new(inventory(&["a", "b"])).failing(SourceCategory::PeerGroups);
        let compiler = ScriptedCompiler::default();
        let calls = compiler.calls();
        let (run, report) = run(&pipeline(source, compiler, PipelineSettings::default())).await;

        let Err(BuildError::CompileDegraded { snapshot, failed }) = run.outcome else {
            panic!("expected a degraded build");
        };
        assert_eq!(failed, vec![DeviceIdentity::new("a"), DeviceIdentity::new("b")]);
        assert_eq!(snapshot.built_count(), 0);
        assert!(matches!(snapshot.get("a"), Some(CompiledDevice::Failed { .. })));
        assert!(matches!(snapshot.get("b"), Some(CompiledDevice::Failed { .. })));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let messages = report.messages();
        assert!(messages.iter().any(|m| m.stage == Stage::Fetch
            && m.severity == Severity::Warning
            && m.text.starts_with("peer-groups fetching failure")));
        let errors = messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .map(|m| (m.stage, m.text.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            errors,
            vec![
                (Stage::Index, "no peer-groups found for a"),
                (Stage::Index, "no peer-groups found for b"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_required_best_effort_source_aborts_strict_builds() {
        let source = ScriptedSource::new(inventory(&["a", "b"])).failing(SourceCategory::PeerGroups);
        let settings = PipelineSettings {
            all_devices_must_build: true,
            ..PipelineSettings::default()
        };
        let (run, _report) = run(&pipeline(source, ScriptedCompiler::default(), settings)).await;

        assert!(matches!(
            run.outcome,
            Err(BuildError::FetchAborted {
                reason: AbortReason::AllDevicesMustBuild { ref missing }
            }) if missing.len() == 2
        ));
    }

    #[tokio::test]
    async fn missing_device_data_degrades_and_keeps_marker() {
        let mut data = inventory(&["A", "B"]);
        data.bgp_sessions.retain(|session| session.peer_a.device.name == "A");
        let (run, report) = run(&pipeline(
            ScriptedSource::new(data),
            ScriptedCompiler::default(),
            PipelineSettings::default(),
        ))
        .await;

        let Err(BuildError::CompileDegraded { snapshot, failed }) = run.outcome else {
            panic!("expected a degraded build");
        };
        assert_eq!(failed, vec![DeviceIdentity::new("B")]);
        assert!(snapshot.get("A").is_some_and(CompiledDevice::is_built));
        assert!(matches!(snapshot.get("B"), Some(CompiledDevice::Failed { .. })));
        let errors = report
            .messages()
            .into_iter()
            .filter(|m| m.severity == Severity::Error)
            .collect::<Vec<_>>();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, Stage::Index);
        assert!(errors[0].text.ends_with("for B"));
    }

    #[tokio::test]
    async fn all_devices_must_build_aborts_on_missing_data() {
        let mut data = inventory(&["A", "B"]);
        data.bgp_sessions.retain(|session| session.peer_a.device.name == "A");
        let settings = PipelineSettings {
            all_devices_must_build: true,
            ..PipelineSettings::default()
        };
        let (run, _report) = run(&pipeline(ScriptedSource::new(data), ScriptedCompiler::default(), settings)).await;

        assert!(matches!(
            run.outcome,
            Err(BuildError::FetchAborted {
                reason: AbortReason::AllDevicesMustBuild { ref missing }
            }) if missing == &vec![DeviceIdentity::new("B")]
        ));
    }

    #[tokio::test]
    async fn compile_failures_are_isolated_per_device() {
        let compiler = ScriptedCompiler::default().failing_for("b");
        let (run, report) = run(&pipeline(
            ScriptedSource::new(inventory(&["a", "b", "c"])),
            compiler,
            PipelineSettings::default(),
        ))
        .await;

        let snapshot = run.outcome.err().and_then(BuildError::into_partial_snapshot);
        let snapshot = snapshot.unwrap_or_default();
        assert_eq!(snapshot.built_count(), 2);
        assert!(matches!(snapshot.get("b"), Some(CompiledDevice::Failed { .. })));
        assert!(report.messages().iter().any(|m| m.stage == Stage::Compile
            && m.severity == Severity::Error
            && m.text.starts_with("build failed for b")));
    }

    #[tokio::test]
    async fn panicking_compiler_marks_device_failed() {
        let compiler = ScriptedCompiler::default().panicking_for("c");
        let (run, _report) = run(&pipeline(
            ScriptedSource::new(inventory(&["a", "c"])),
            compiler,
            PipelineSettings::default(),
        ))
        .await;

        assert!(matches!(
            run.outcome,
            Err(BuildError::CompileDegraded { ref failed, .. }) if failed == &vec![DeviceIdentity::new("c")]
        ));
    }

    #[tokio::test]
    async fn stalled_source_times_out_with_its_policy_severity() {
        let source = ScriptedSource::new(inventory(&["a"])).stalling(SourceCategory::BgpGlobal);
        let settings = PipelineSettings {
            source_timeout: Some(Duration::from_millis(50)),
            ..PipelineSettings::default()
        };
        let (run, report) = run(&pipeline(source, ScriptedCompiler::default(), settings)).await;

        assert!(run.outcome.is_ok());
        assert!(report.messages().iter().any(|m| m.severity == Severity::Warning
            && m.text.contains("timed out")));
    }

    #[tokio::test]
    async fn policy_overrides_change_fetch_severity() {
        let settings = PipelineSettings {
            policy: SourcePolicy::default().with_rule(
                SourceCategory::Snmp,
                SourceRule {
                    criticality: Criticality::Critical,
                    required: false,
                },
            ),
            ..PipelineSettings::default()
        };
        let source = ScriptedSource::new(inventory(&["a"])).failing(SourceCategory::Snmp);
        let (run, _report) = run(&pipeline(source, ScriptedCompiler::default(), settings)).await;

        assert!(matches!(run.outcome, Err(BuildError::FetchAborted { .. })));
    }

    #[tokio::test]
    async fn stats_cover_every_stage() {
        let (run, _report) = run(&pipeline(
            ScriptedSource::new(inventory(&["a"])),
            ScriptedCompiler::default(),
            PipelineSettings::default(),
        ))
        .await;

        let stats = run.stats;
        assert!(stats.build_duration >= stats.data_fetching_duration);
        assert!(
            stats.build_duration
                >= stats.data_fetching_duration + stats.precompute_duration + stats.compute_duration
        );
    }
}
