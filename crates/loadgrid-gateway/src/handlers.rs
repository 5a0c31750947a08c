//! Gateway handlers.
//!
//! Single-app routes return a `LoadgridError` on failure and let its
//! `IntoResponse` pick the status. Fan-out routes always answer 200 and
//! report failures per app.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use http::Uri;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use loadgrid_core::{
    HealthStatus, LevelSet, LevelUpdate, LevelsResponse, LoadgridError, LoadgridResult,
    MetricSnapshot,
};
use loadgrid_health::http_probe;

use crate::GatewayState;
use crate::fanout::fan_out;
use crate::registry::{AppEntry, AppRegistry};
use crate::upstream::UpstreamClient;

// ── Wire types ─────────────────────────────────────────────────────

/// Body of `POST /resources`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub app_name: String,
    /// Validated into a `LevelUpdate` after the app is resolved.
    pub levels: serde_json::Value,
}

/// Body of `POST /resources/all`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    pub levels: BTreeMap<String, serde_json::Value>,
}

/// Levels an app confirmed after an update or reset.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppLevels {
    pub success: bool,
    pub app_name: String,
    pub levels: LevelSet,
}

/// Outcome for one app in a bulk update.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<LevelSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LoadgridResult<LevelSet>> for AppResult {
    fn from(result: LoadgridResult<LevelSet>) -> Self {
        match result {
            Ok(levels) => Self {
                success: true,
                levels: Some(levels),
                error: None,
            },
            Err(e) => Self {
                success: false,
                levels: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUpdateResponse {
    pub results: BTreeMap<String, AppResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// One entry of the aggregated `GET /metrics`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AppMetrics {
    Healthy { metrics: MetricSnapshot },
    Unhealthy { error: String },
}

/// One entry of `GET /services/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: HealthStatus,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_body<T: DeserializeOwned>(
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> LoadgridResult<T> {
    let Json(value) = payload.map_err(|e| LoadgridError::Validation(e.body_text()))?;
    serde_json::from_value(value).map_err(|e| LoadgridError::Validation(e.to_string()))
}

/// Forward an update to one worker and remember what it confirmed.
async fn forward_update(
    client: UpstreamClient,
    registry: AppRegistry,
    app: String,
    base: Uri,
    update: LevelUpdate,
) -> LoadgridResult<LevelSet> {
    let resp: LevelsResponse = client
        .post_json(&app, &base, "/resources", &update)
        .await
        .inspect_err(|e| warn!(%app, error = %e, "level update not delivered"))?;
    registry.set_levels(&app, resp.levels.clone()).await?;
    debug!(%app, changed = update.len(), "level update delivered");
    Ok(resp.levels)
}

// ── Liveness ───────────────────────────────────────────────────────

/// GET /
pub async fn root(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "loadgrid gateway",
        "status": "running",
        "apps": state.registry.len().await,
    }))
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    let apps = state.registry.list().await;
    let healthy = apps
        .values()
        .filter(|e| e.status == HealthStatus::Healthy)
        .count();
    Json(serde_json::json!({
        "status": "ok",
        "apps": apps.len(),
        "healthy_apps": healthy,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

// ── Registry ───────────────────────────────────────────────────────

/// GET /apps
pub async fn list_apps(State(state): State<GatewayState>) -> Json<BTreeMap<String, AppEntry>> {
    Json(state.registry.list().await)
}

/// GET /apps/{name}
pub async fn get_app(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Result<Json<AppEntry>, LoadgridError> {
    state.registry.get(&name).await.map(Json)
}

/// GET /resources
pub async fn list_levels(State(state): State<GatewayState>) -> Json<BTreeMap<String, LevelSet>> {
    let levels = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|(name, entry)| (name, entry.levels))
        .collect();
    Json(levels)
}

// ── Updates ────────────────────────────────────────────────────────

/// POST /resources
pub async fn update_resources(
    State(state): State<GatewayState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<AppLevels>, LoadgridError> {
    let req: UpdateRequest = parse_body(payload)?;
    let base = state.registry.endpoint(&req.app_name).await?;
    let update = LevelUpdate::try_from(req.levels)?;

    let levels = forward_update(
        state.client.clone(),
        state.registry.clone(),
        req.app_name.clone(),
        base,
        update,
    )
    .await?;

    info!(app = %req.app_name, "resource levels updated");
    Ok(Json(AppLevels {
        success: true,
        app_name: req.app_name,
        levels,
    }))
}

/// POST /resources/all
pub async fn update_all(
    State(state): State<GatewayState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<BulkUpdateResponse>, LoadgridError> {
    let req: BulkUpdateRequest = parse_body(payload)?;

    let mut results = BTreeMap::new();
    let mut targets = Vec::new();
    for (app, raw) in req.levels {
        let prepared = match state.registry.endpoint(&app).await {
            Ok(base) => LevelUpdate::try_from(raw).map(|update| (base, update)),
            Err(e) => Err(e),
        };
        match prepared {
            Ok(target) => targets.push((app, target)),
            Err(e) => {
                debug!(%app, error = %e, "bulk entry rejected");
                results.insert(app, AppResult::from(Err(e)));
            }
        }
    }

    let client = state.client.clone();
    let registry = state.registry.clone();
    let delivered = fan_out(targets, |app, (base, update)| {
        forward_update(client.clone(), registry.clone(), app, base, update)
    })
    .await;
    results.extend(delivered.into_iter().map(|(app, r)| (app, AppResult::from(r))));

    let succeeded = results.values().filter(|r| r.success).count();
    let failed = results.len() - succeeded;
    info!(succeeded, failed, "bulk level update finished");

    Ok(Json(BulkUpdateResponse {
        results,
        succeeded,
        failed,
    }))
}

/// POST /apps/{name}/reset
pub async fn reset_app(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Result<Json<AppLevels>, LoadgridError> {
    let base = state.registry.endpoint(&name).await?;
    let resp: LevelsResponse = state
        .client
        .post_json(&name, &base, "/resources/reset", &serde_json::json!({}))
        .await
        .inspect_err(|e| warn!(app = %name, error = %e, "reset not delivered"))?;
    state.registry.set_levels(&name, resp.levels.clone()).await?;

    info!(app = %name, "resource levels reset");
    Ok(Json(AppLevels {
        success: true,
        app_name: name,
        levels: resp.levels,
    }))
}

// ── Aggregation ────────────────────────────────────────────────────

/// GET /metrics
pub async fn aggregate_metrics(
    State(state): State<GatewayState>,
) -> Json<BTreeMap<String, AppMetrics>> {
    let client = state.client.clone();
    let results = fan_out(state.registry.endpoints().await, |app, base| {
        let client = client.clone();
        async move {
            client
                .get_json::<MetricSnapshot>(&app, &base, "/metrics")
                .await
        }
    })
    .await;

    let mut out = BTreeMap::new();
    for (app, result) in results {
        let entry = match result {
            // Read-only: registry levels only change through updates and resets.
            Ok(metrics) => AppMetrics::Healthy { metrics },
            Err(e) => {
                warn!(%app, error = %e, "metrics unavailable");
                AppMetrics::Unhealthy {
                    error: e.to_string(),
                }
            }
        };
        out.insert(app, entry);
    }
    Json(out)
}

/// GET /services/status
pub async fn services_status(
    State(state): State<GatewayState>,
) -> Json<BTreeMap<String, ServiceStatus>> {
    let endpoint = state.health.endpoint.clone();
    let timeout = state.health.timeout();
    let apps = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|(name, entry)| (name, (entry.base, entry.url)));

    let results = fan_out(apps, |_, (base, url)| {
        let endpoint = endpoint.clone();
        async move {
            let report = http_probe(&base, &endpoint, timeout).await;
            let status = if report.is_healthy() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            };
            Ok(ServiceStatus {
                status,
                url,
                response_code: report.response_code,
                error: report.error,
            })
        }
    })
    .await;

    let out = results
        .into_iter()
        .filter_map(|(app, r)| match r {
            Ok(status) => Some((app, status)),
            Err(e) => {
                warn!(%app, error = %e, "status probe failed");
                None
            }
        })
        .collect();
    Json(out)
}
