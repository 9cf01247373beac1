//! Build reports and the rebuild trigger.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use netagg_report::Report;
use serde_json::json;
use tracing::info;

use crate::handles::BuildHandles;
use crate::trigger::TriggerResponse;

fn serve(report: Option<Arc<Report>>) -> Response {
    report.map_or_else(
        || Json(json!({})).into_response(),
        |report| Json(report.snapshot()).into_response(),
    )
}

pub(crate) async fn last(State(handles): State<BuildHandles>) -> Response {
    serve(handles.last_report())
}

pub(crate) async fn last_complete(State(handles): State<BuildHandles>) -> Response {
    serve(handles.last_complete_report())
}

pub(crate) async fn last_successful(State(handles): State<BuildHandles>) -> Response {
    serve(handles.last_successful_report())
}

pub(crate) async fn trigger(State(handles): State<BuildHandles>) -> Response {
    let response = handles.request_build();
    info!(response = response.message(), "build trigger requested");
    let status = match response {
        TriggerResponse::Accepted | TriggerResponse::AlreadyPending => StatusCode::OK,
        TriggerResponse::SchedulerStopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "message": response.message() }))).into_response()
}
