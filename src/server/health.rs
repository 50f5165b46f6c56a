use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use super::AppState;
use crate::system::snapshot::{Snapshot, unix_now};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<f64>,
}

pub fn test_mode_report(now: f64) -> HealthReport {
    HealthReport {
        status: HealthStatus::Healthy,
        message: Some("Running in test mode".to_string()),
        gpu_count: Some(0),
        last_update: Some(now),
    }
}

/// Health from tool availability and the last published snapshot.
pub fn assess(tool_available: bool, snapshot: &Snapshot, now: f64) -> (StatusCode, HealthReport) {
    if !tool_available {
        return (
            StatusCode::OK,
            HealthReport {
                status: HealthStatus::Degraded,
                message: Some("nvidia-smi not available - GPU monitoring disabled".to_string()),
                gpu_count: Some(0),
                last_update: Some(now),
            },
        );
    }

    if let Some(error) = &snapshot.error {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            HealthReport {
                status: HealthStatus::Error,
                message: Some(error.clone()),
                gpu_count: None,
                last_update: None,
            },
        );
    }

    (
        StatusCode::OK,
        HealthReport {
            status: HealthStatus::Healthy,
            message: None,
            gpu_count: Some(snapshot.devices.len()),
            last_update: Some(snapshot.timestamp.unwrap_or(0.0)),
        },
    )
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    if state.test_mode {
        return (StatusCode::OK, Json(test_mode_report(unix_now())));
    }

    let smi = state.smi.clone();
    let tool_available = match tokio::task::spawn_blocking(move || smi.probe_version()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(%err, "version probe failed");
            false
        }
        Err(err) => {
            tracing::warn!(%err, "version probe aborted");
            false
        }
    };

    let (status, report) = assess(tool_available, &state.store.current(), unix_now());
    (status, Json(report))
}
