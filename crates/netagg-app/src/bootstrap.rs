//! Service wiring: settings, logging, metrics, scheduler and HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use netagg_config::{AppConfig, LogFormatKind};
use netagg_inventory::NetboxSource;
use netagg_telemetry::{LogFormat, LoggingConfig, Metrics};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::compiler::ReferenceCompiler;
use crate::error::{AppError, AppResult};
use crate::http::router;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::scheduler::Scheduler;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point for the service boot sequence.
///
/// # Errors
///
/// Returns an error if settings cannot be loaded, logging or metrics cannot be
/// initialised, the listener cannot be bound, or the server fails.
pub async fn run_app() -> AppResult<()> {
    let config = netagg_config::load().map_err(|err| AppError::config("config.load", err))?;
    netagg_telemetry::init_logging(&LoggingConfig {
        level: &config.log.level,
        format: log_format(config.log.format),
        version: VERSION,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    run_app_with(config).await
}

/// Boot sequence over an already loaded configuration.
pub(crate) async fn run_app_with(config: AppConfig) -> AppResult<()> {
    info!(
        version = VERSION,
        inventory = %config.inventory.url,
        datacenter = %config.inventory.datacenter,
        "netagg bootstrap starting"
    );

    let metrics =
        Metrics::new(VERSION).map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let source = NetboxSource::new(&config.inventory)
        .map_err(|err| AppError::http("inventory.client", err))?;
    let pipeline = Pipeline::new(
        Arc::new(source),
        Arc::new(ReferenceCompiler),
        PipelineSettings::from(&config.build),
    );
    let (scheduler, handles) = Scheduler::new(pipeline, metrics, config.build.interval());

    let addr = SocketAddr::new(config.api.listen_address, config.api.listen_port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::io("listener.bind", addr, err))?;

    let (stop, shutdown) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown));

    info!(addr = %addr, "Launching API listener");
    let served = axum::serve(listener, router(handles))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("waiting for the current build before exiting");
    if stop.send(true).is_err() {
        debug!("build scheduler already stopped");
    }
    scheduler_task
        .await
        .map_err(|source| AppError::Scheduler { source })?;
    served.map_err(|err| AppError::io("api.serve", addr, err))?;
    info!("shutdown complete");
    Ok(())
}

const fn log_format(kind: LogFormatKind) -> LogFormat {
    match kind {
        LogFormatKind::Json => LogFormat::Json,
        LogFormatKind::Pretty => LogFormat::Pretty,
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
