//! Route table and HTTP layers.

use std::time::Duration;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::handles::BuildHandles;
use crate::http::{devices, health, reports};

/// Router serving the live snapshot, reports, readiness and metrics.
pub fn router(handles: BuildHandles) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                route = %request.uri().path(),
                status_code = tracing::field::Empty,
                latency_ms = tracing::field::Empty
            )
        })
        .on_request(|_request: &Request<_>, _span: &Span| {})
        .on_response(
            |response: &axum::response::Response, latency: Duration, span: &Span| {
                span.record("status_code", response.status().as_u16());
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                span.record("latency_ms", latency_ms);
            },
        );

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/ready", get(health::ready))
        .route("/api/version", get(health::version))
        .route("/metrics", get(health::metrics))
        .route("/v1/devices/{hostname}/openconfig", get(devices::openconfig))
        .route("/v1/devices/{hostname}/ietfconfig", get(devices::ietfconfig))
        .route("/v1/devices/{hostname}/config", get(devices::config))
        .route("/v1/devices/{hostname}/afk_enabled", get(devices::afk_enabled))
        .route("/v1/report/last", get(reports::last))
        .route("/v1/report/last/complete", get(reports::last_complete))
        .route("/v1/report/last/successful", get(reports::last_successful))
        .route("/v1/build/trigger", post(reports::trigger))
        .layer(ServiceBuilder::new().layer(trace_layer))
        .with_state(handles)
}
