use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use serde::Serialize;

use super::AppState;
use super::error::ApiError;
use crate::system::device::GpuDevice;
use crate::system::process::GpuProcess;
use crate::system::snapshot::Snapshot;

#[derive(Debug, Serialize)]
pub struct GpuResponse {
    pub timestamp: Option<f64>,
    pub gpu: GpuDevice,
}

#[derive(Debug, Serialize)]
pub struct ProcessListResponse {
    pub timestamp: Option<f64>,
    pub processes: Vec<GpuProcess>,
}

/// The current snapshot as-is, error or not.
pub async fn snapshot(State(state): State<AppState>) -> Json<Arc<Snapshot>> {
    Json(state.store.current())
}

pub async fn gpu_by_index(
    State(state): State<AppState>,
    index: Result<Path<u32>, PathRejection>,
) -> Result<Json<GpuResponse>, ApiError> {
    let Path(index) = index.map_err(|rejection| ApiError::InvalidIndex(rejection.body_text()))?;
    let snapshot = state.store.current();
    check_upstream(&snapshot)?;

    let gpu = snapshot
        .device(index)
        .cloned()
        .ok_or(ApiError::GpuNotFound(index))?;
    Ok(Json(GpuResponse {
        timestamp: snapshot.timestamp,
        gpu,
    }))
}

pub async fn processes(State(state): State<AppState>) -> Result<Json<ProcessListResponse>, ApiError> {
    let snapshot = state.store.current();
    check_upstream(&snapshot)?;

    Ok(Json(ProcessListResponse {
        timestamp: snapshot.timestamp,
        processes: snapshot.processes.clone(),
    }))
}

fn check_upstream(snapshot: &Snapshot) -> Result<(), ApiError> {
    match &snapshot.error {
        Some(error) => Err(ApiError::Upstream(error.clone())),
        None => Ok(()),
    }
}
