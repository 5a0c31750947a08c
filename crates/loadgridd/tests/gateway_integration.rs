//! Gateway integration tests.
//!
//! Starts real worker routers on ephemeral ports, points a gateway at
//! them (plus one app that never answers), and drives the gateway API.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use loadgrid_core::{AppConfig, GatewayConfig, LevelSet, MetricSnapshot, ResourceKind};
use loadgrid_gateway::handlers::{AppMetrics, BulkUpdateResponse};
use loadgrid_gateway::{AppEntry, GatewayState, build_router};
use loadgrid_sim::{ModelSettings, ResourceModel};
use loadgrid_worker::WorkerState;

const LIVE_APPS: [&str; 3] = ["user_management", "inventory_system", "notification_center"];
const DEAD_APP: &str = "payment_processing";

async fn spawn_worker(name: &str) -> String {
    let state = WorkerState::new(ResourceModel::new(name, ModelSettings::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = loadgrid_worker::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn test_gateway() -> GatewayState {
    let mut config = GatewayConfig::builtin();
    config.gateway.read_timeout = "1s".to_string();
    config.gateway.write_timeout = "1s".to_string();

    let mut apps = Vec::new();
    for name in LIVE_APPS {
        apps.push(AppConfig::new(name, &spawn_worker(name).await));
    }
    apps.push(AppConfig::new(DEAD_APP, "http://127.0.0.1:1"));
    config.apps = apps;
    config.validate().unwrap();

    GatewayState::new(&config).unwrap()
}

async fn send(state: &GatewayState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn list_apps(state: &GatewayState) -> BTreeMap<String, serde_json::Value> {
    let (status, body) = send(state, get("/apps")).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn fresh_gateway_lists_every_app_idle() {
    let state = test_gateway().await;
    let apps = list_apps(&state).await;

    assert_eq!(apps.len(), 4);
    let names: Vec<&String> = apps.keys().collect();
    assert_eq!(
        names,
        ["inventory_system", "notification_center", "payment_processing", "user_management"]
    );
    for entry in apps.values() {
        let levels: LevelSet = serde_json::from_value(entry["levels"].clone()).unwrap();
        assert_eq!(levels, LevelSet::default());
        assert_eq!(entry["status"], "unknown");
    }
}

#[tokio::test]
async fn update_then_list_shows_levels() {
    let state = test_gateway().await;
    let (status, _) = send(
        &state,
        post(
            "/resources",
            json!({"app_name": "notification_center", "levels": {"traffic": 45, "completions": 20}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, entry) = send(&state, get("/apps/notification_center")).await;
    assert_eq!(entry["levels"]["traffic"], 45);
    assert_eq!(entry["levels"]["completions"], 20);
    assert_eq!(entry["levels"]["processing"], 0);
    assert_eq!(entry["display_name"], "Notification Center");
}

#[tokio::test]
async fn second_update_replaces_the_first() {
    let state = test_gateway().await;
    send(
        &state,
        post(
            "/resources",
            json!({"app_name": "user_management", "levels": {"processing": 50, "storage": 50}}),
        ),
    )
    .await;
    let (status, body) = send(
        &state,
        post("/resources", json!({"app_name": "user_management", "levels": {"processing": 10}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["levels"]["storage"], 0);

    let apps = list_apps(&state).await;
    let levels: LevelSet =
        serde_json::from_value(apps["user_management"]["levels"].clone()).unwrap();
    assert_eq!(levels.get(ResourceKind::Processing), 10);
    assert_eq!(levels.get(ResourceKind::Storage), 0);

    let (_, body) = send(&state, get("/metrics")).await;
    let snap: MetricSnapshot =
        serde_json::from_value(body["user_management"]["metrics"].clone()).unwrap();
    assert_eq!(snap.levels, levels);
    assert!(snap.memory_percent <= 5.0);

    let (_, body) = send(&state, get("/resources")).await;
    assert_eq!(body["user_management"]["storage"], 0);
    assert_eq!(body["user_management"]["processing"], 10);
}

#[tokio::test]
async fn full_load_shows_in_aggregate_metrics() {
    let state = test_gateway().await;
    send(
        &state,
        post(
            "/resources",
            json!({"app_name": "user_management", "levels": {"processing": 100, "storage": 100}}),
        ),
    )
    .await;

    let (status, body) = send(&state, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let metrics: BTreeMap<String, AppMetrics> = serde_json::from_value(body).unwrap();

    let AppMetrics::Healthy { metrics: snap } = &metrics["user_management"] else {
        panic!("user_management should be reachable");
    };
    assert!(snap.is_running);
    assert!((95.0..=100.0).contains(&snap.cpu_percent));
    assert!((95.0..=100.0).contains(&snap.memory_percent));
    assert_eq!(snap.instance_count, 4);

    let AppMetrics::Healthy { metrics: idle } = &metrics["inventory_system"] else {
        panic!("inventory_system should be reachable");
    };
    assert!(!idle.is_running);
    assert_eq!(idle.cpu_percent, 0.0);
}

#[tokio::test]
async fn aggregate_metrics_survive_dead_worker() {
    let state = test_gateway().await;
    let (status, body) = send(&state, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body[DEAD_APP]["status"], "unhealthy");
    assert!(body[DEAD_APP]["error"].as_str().unwrap().contains(DEAD_APP));
    for app in LIVE_APPS {
        assert_eq!(body[app]["status"], "healthy");
        let snap: MetricSnapshot = serde_json::from_value(body[app]["metrics"].clone()).unwrap();
        assert_eq!(snap.app_name, app);
    }
}

#[tokio::test]
async fn bulk_update_tolerates_partial_failure() {
    let state = test_gateway().await;
    let levels: serde_json::Map<String, serde_json::Value> = LIVE_APPS
        .iter()
        .chain([&DEAD_APP])
        .map(|app| (app.to_string(), json!({"orders": 75})))
        .collect();

    let (status, body) = send(&state, post("/resources/all", json!({ "levels": levels }))).await;
    assert_eq!(status, StatusCode::OK);

    let resp: BulkUpdateResponse = serde_json::from_value(body).unwrap();
    assert_eq!(resp.succeeded, 3);
    assert_eq!(resp.failed, 1);
    assert!(!resp.results[DEAD_APP].success);

    let apps = list_apps(&state).await;
    for app in LIVE_APPS {
        assert_eq!(apps[app]["levels"]["orders"], 75, "{app} should be updated");
    }
    assert_eq!(apps[DEAD_APP]["levels"]["orders"], 0);
}

#[tokio::test]
async fn reset_returns_app_to_idle() {
    let state = test_gateway().await;
    send(
        &state,
        post("/resources", json!({"app_name": "inventory_system", "levels": {"storage": 55}})),
    )
    .await;

    let (status, _) = send(&state, post("/apps/inventory_system/reset", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, entry) = send(&state, get("/apps/inventory_system")).await;
    assert_eq!(entry["levels"]["storage"], 0);

    let (_, body) = send(&state, get("/metrics")).await;
    assert_eq!(body["inventory_system"]["metrics"]["is_running"], false);
}

#[tokio::test]
async fn unknown_app_and_bad_payloads() {
    let state = test_gateway().await;

    let (status, body) = send(&state, get("/apps/billing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = send(&state, post("/apps/billing/reset", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &state,
        post("/resources", json!({"app_name": "user_management", "levels": {"processing": "high"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["success"], false);

    let (status, _) = send(&state, post("/resources/all", json!({"levels": [1, 2]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_levels_are_clamped_end_to_end() {
    let state = test_gateway().await;
    let (status, body) = send(
        &state,
        post(
            "/resources",
            json!({"app_name": "user_management", "levels": {"processing": 250, "traffic": -10}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let levels: LevelSet = serde_json::from_value(body["levels"].clone()).unwrap();
    assert_eq!(levels.get(ResourceKind::Processing), 100);
    assert_eq!(levels.get(ResourceKind::Traffic), 0);
}

#[tokio::test]
async fn services_status_reports_each_app() {
    let state = test_gateway().await;
    let (status, body) = send(&state, get("/services/status")).await;
    assert_eq!(status, StatusCode::OK);

    for app in LIVE_APPS {
        assert_eq!(body[app]["status"], "healthy");
        assert_eq!(body[app]["response_code"], 200);
    }
    assert_eq!(body[DEAD_APP]["status"], "unhealthy");
}

#[tokio::test]
async fn registry_keeps_configured_urls() {
    let state = test_gateway().await;
    let entries = state.registry.list().await;
    let entry: &AppEntry = &entries["user_management"];
    assert!(entry.url.starts_with("http://127.0.0.1:"));
    assert!(entry.last_checked.is_none());
}
