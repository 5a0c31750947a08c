//! Worker handlers.
//!
//! Each handler touches the resource model once and returns JSON.
//! Malformed level payloads become a 400 with `kind: "validation"`;
//! nothing a client sends can take the worker down.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use tracing::{debug, info};

use loadgrid_core::{HealthReport, LevelSet, LevelUpdate, LevelsResponse, LoadgridError, MetricSnapshot};

use crate::WorkerState;

fn levels_response(state: &WorkerState, levels: LevelSet) -> Json<LevelsResponse> {
    Json(LevelsResponse {
        status: "success".to_string(),
        app_name: state.model.app_name().to_string(),
        levels,
    })
}

/// GET /
pub async fn root(State(state): State<WorkerState>) -> impl IntoResponse {
    let app_name = state.model.app_name();
    Json(serde_json::json!({
        "message": format!("{app_name} service"),
        "status": "running",
        "app_name": app_name,
    }))
}

/// GET /health
pub async fn health(State(state): State<WorkerState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".to_string(),
        app_name: state.model.app_name().to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<WorkerState>) -> Json<MetricSnapshot> {
    state.model.record_request();
    Json(state.model.read_metrics())
}

/// GET /resources
pub async fn get_resources(State(state): State<WorkerState>) -> Json<LevelsResponse> {
    levels_response(&state, state.model.levels())
}

/// POST /resources
pub async fn update_resources(
    State(state): State<WorkerState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<LevelsResponse>, LoadgridError> {
    state.model.record_request();

    let update = payload
        .map_err(|e| LoadgridError::Validation(e.body_text()))
        .and_then(|Json(value)| LevelUpdate::try_from(value))
        .inspect_err(|e| {
            state.model.record_error();
            debug!(app = %state.model.app_name(), error = %e, "rejected level update");
        })?;

    let levels = state.model.replace(&update);
    info!(
        app = %state.model.app_name(),
        running = levels.any_active(),
        "resource levels updated"
    );
    Ok(levels_response(&state, levels))
}

/// POST /resources/reset
pub async fn reset_resources(State(state): State<WorkerState>) -> Json<LevelsResponse> {
    state.model.record_request();
    let levels = state.model.reset();
    info!(app = %state.model.app_name(), "resource levels reset");
    levels_response(&state, levels)
}

/// POST /reset-metrics
pub async fn reset_metrics(State(state): State<WorkerState>) -> impl IntoResponse {
    state.model.reset_counters();
    info!(app = %state.model.app_name(), "request counters reset");
    Json(serde_json::json!({
        "status": "success",
        "app_name": state.model.app_name(),
        "message": "metrics reset",
    }))
}
