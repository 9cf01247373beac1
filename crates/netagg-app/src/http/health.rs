//! Liveness, readiness and diagnostics endpoints.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use netagg_telemetry::build_version;
use serde_json::{Value, json};
use tracing::error;

use crate::handles::BuildHandles;
use crate::http::errors::ApiError;

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once a build has succeeded.
pub(crate) async fn ready(State(handles): State<BuildHandles>) -> Response {
    if handles.is_ready() {
        Json(json!({ "status": "ok" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready" })),
        )
            .into_response()
    }
}

pub(crate) async fn version() -> Json<Value> {
    Json(json!({ "version": build_version() }))
}

pub(crate) async fn metrics(State(handles): State<BuildHandles>) -> Result<Response, ApiError> {
    match handles.metrics().render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
