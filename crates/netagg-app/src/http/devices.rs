//! Compiled device documents.
//!
//! `*` as hostname selects every device of the live snapshot. Devices that
//! failed to build are served as `{}` in the wildcard view and as an error
//! when requested by name.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use netagg_inventory::CompiledArtifact;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::handles::BuildHandles;
use crate::http::errors::ApiError;
use crate::snapshot::CompiledDevice;

const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy)]
enum Document {
    OpenConfig,
    Ietf,
    Both,
}

impl Document {
    fn render(self, artifact: &CompiledArtifact) -> Value {
        match self {
            Self::OpenConfig => artifact.openconfig.clone(),
            Self::Ietf => artifact.ietf.clone(),
            Self::Both => json!({
                "openconfig": artifact.openconfig,
                "ietfconfig": artifact.ietf,
            }),
        }
    }
}

fn serve(handles: &BuildHandles, hostname: &str, document: Document) -> Result<Json<Value>, ApiError> {
    if hostname == WILDCARD {
        let snapshot = handles.snapshot();
        let all: Map<String, Value> = snapshot
            .iter()
            .map(|(identity, device)| {
                let rendered = device
                    .artifact()
                    .map_or_else(|| json!({}), |artifact| document.render(artifact));
                (identity.to_string(), rendered)
            })
            .collect();
        return Ok(Json(Value::Object(all)));
    }

    match handles.device(hostname) {
        None => Ok(Json(json!({}))),
        Some(CompiledDevice::Built(artifact)) => Ok(Json(document.render(&artifact))),
        Some(CompiledDevice::Failed { reason }) => {
            warn!(device = hostname, reason = %reason, "requested device failed to build");
            Err(ApiError::internal("build failed for this device").with_detail(reason))
        }
    }
}

pub(crate) async fn openconfig(
    State(handles): State<BuildHandles>,
    Path(hostname): Path<String>,
) -> Result<Json<Value>, ApiError> {
    serve(&handles, &hostname, Document::OpenConfig)
}

pub(crate) async fn ietfconfig(
    State(handles): State<BuildHandles>,
    Path(hostname): Path<String>,
) -> Result<Json<Value>, ApiError> {
    serve(&handles, &hostname, Document::Ietf)
}

pub(crate) async fn config(
    State(handles): State<BuildHandles>,
    Path(hostname): Path<String>,
) -> Result<Json<Value>, ApiError> {
    serve(&handles, &hostname, Document::Both)
}

/// Agent-managed flag; devices that failed to build report `false`.
pub(crate) async fn afk_enabled(
    State(handles): State<BuildHandles>,
    Path(hostname): Path<String>,
) -> Response {
    let flag = |device: &CompiledDevice| device.artifact().is_some_and(|artifact| artifact.afk_enabled);
    if hostname == WILDCARD {
        let snapshot = handles.snapshot();
        let all: Map<String, Value> = snapshot
            .iter()
            .map(|(identity, device)| (identity.to_string(), Value::Bool(flag(device))))
            .collect();
        return Json(Value::Object(all)).into_response();
    }
    match handles.device(&hostname) {
        Some(device) => Json(json!(flag(&device))).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}
