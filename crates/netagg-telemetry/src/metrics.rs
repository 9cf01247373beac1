//! Prometheus registry describing build outcomes.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{
    Encoder, Gauge, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by the scheduler and the read surface.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    build_status: IntGauge,
    completed_build_total: IntCounterVec,
    built_devices_number: IntGauge,
    build_total_duration: Gauge,
    build_data_fetching_duration: Gauge,
    build_precompute_duration: Gauge,
    build_compute_duration: Gauge,
}

/// Stage durations of one build, fed into the duration gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildDurations {
    /// Time spent fetching every source.
    pub data_fetching: Duration,
    /// Time spent grouping records per device.
    pub precompute: Duration,
    /// Time spent compiling devices.
    pub compute: Duration,
    /// Wall-clock duration of the whole build.
    pub total: Duration,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// 1 when the last completed build succeeded, 0 otherwise.
    pub build_status: i64,
    /// Successful builds since start.
    pub successful_builds: u64,
    /// Failed builds since start.
    pub failed_builds: u64,
    /// Devices built by the last successful build.
    pub built_devices: i64,
    /// Total duration of the last build, in seconds.
    pub build_total_duration_seconds: f64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new(version: &str) -> Result<Self> {
        let registry = Registry::new();

        let app_info = IntGaugeVec::new(
            Opts::new("netagg_info", "Version of the application"),
            &["version"],
        )
        .map_err(|source| collector("netagg_info", source))?;
        let build_status = IntGauge::with_opts(Opts::new(
            "build_status",
            "Last completed build status, 0=Failed, 1=Success",
        ))
        .map_err(|source| collector("build_status", source))?;
        let completed_build_total = IntCounterVec::new(
            Opts::new("completed_build_total", "Total number of completed builds"),
            &["success"],
        )
        .map_err(|source| collector("completed_build_total", source))?;
        let built_devices_number = IntGauge::with_opts(Opts::new(
            "built_devices_number",
            "Number of devices built during last successful build",
        ))
        .map_err(|source| collector("built_devices_number", source))?;
        let build_total_duration = Gauge::with_opts(Opts::new(
            "build_total_duration_seconds",
            "Total duration of the build",
        ))
        .map_err(|source| collector("build_total_duration_seconds", source))?;
        let build_data_fetching_duration = Gauge::with_opts(Opts::new(
            "build_data_fetching_duration_seconds",
            "Duration of the data fetching step",
        ))
        .map_err(|source| collector("build_data_fetching_duration_seconds", source))?;
        let build_precompute_duration = Gauge::with_opts(Opts::new(
            "build_precompute_duration_seconds",
            "Duration of the precompute step",
        ))
        .map_err(|source| collector("build_precompute_duration_seconds", source))?;
        let build_compute_duration = Gauge::with_opts(Opts::new(
            "build_compute_duration_seconds",
            "Duration of the compute step",
        ))
        .map_err(|source| collector("build_compute_duration_seconds", source))?;

        register(&registry, "netagg_info", app_info.clone())?;
        register(&registry, "build_status", build_status.clone())?;
        register(&registry, "completed_build_total", completed_build_total.clone())?;
        register(&registry, "built_devices_number", built_devices_number.clone())?;
        register(
            &registry,
            "build_total_duration_seconds",
            build_total_duration.clone(),
        )?;
        register(
            &registry,
            "build_data_fetching_duration_seconds",
            build_data_fetching_duration.clone(),
        )?;
        register(
            &registry,
            "build_precompute_duration_seconds",
            build_precompute_duration.clone(),
        )?;
        register(
            &registry,
            "build_compute_duration_seconds",
            build_compute_duration.clone(),
        )?;

        app_info.with_label_values(&[version]).set(1);

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                build_status,
                completed_build_total,
                built_devices_number,
                build_total_duration,
                build_data_fetching_duration,
                build_precompute_duration,
                build_compute_duration,
            }),
        })
    }

    /// Record a successful build: status gauge to 1, success counter incremented.
    pub fn build_successful(&self) {
        self.inner.build_status.set(1);
        self.inner
            .completed_build_total
            .with_label_values(&["true"])
            .inc();
    }

    /// Record a failed build: status gauge to 0, failure counter incremented.
    pub fn build_failed(&self) {
        self.inner.build_status.set(0);
        self.inner
            .completed_build_total
            .with_label_values(&["false"])
            .inc();
    }

    /// Set the number of devices served by the last successful build.
    pub fn set_built_devices(&self, count: usize) {
        self.inner
            .built_devices_number
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record stage durations of the last build.
    pub fn observe_build_durations(&self, durations: BuildDurations) {
        self.inner
            .build_total_duration
            .set(durations.total.as_secs_f64());
        self.inner
            .build_data_fetching_duration
            .set(durations.data_fetching.as_secs_f64());
        self.inner
            .build_precompute_duration
            .set(durations.precompute.as_secs_f64());
        self.inner
            .build_compute_duration
            .set(durations.compute.as_secs_f64());
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the build gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            build_status: self.inner.build_status.get(),
            successful_builds: self
                .inner
                .completed_build_total
                .with_label_values(&["true"])
                .get(),
            failed_builds: self
                .inner
                .completed_build_total
                .with_label_values(&["false"])
                .get(),
            built_devices: self.inner.built_devices_number.get(),
            build_total_duration_seconds: self.inner.build_total_duration.get(),
        }
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
