//! loadgrid-gateway — single entry point in front of every worker.
//!
//! Holds a static registry of business apps, forwards level updates to
//! them, aggregates their metrics, and keeps a background health monitor
//! per app that writes status into the registry.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Gateway banner |
//! | GET | `/health` | Gateway liveness |
//! | GET | `/apps` | Every registered app, sorted by name |
//! | GET | `/apps/{name}` | One registered app |
//! | GET | `/resources` | Last-known levels of every app |
//! | POST | `/resources` | Forward a level update to one app |
//! | POST | `/resources/all` | Forward level updates to many apps |
//! | POST | `/apps/{name}/reset` | Reset one app's levels |
//! | GET | `/metrics` | Aggregated worker metrics |
//! | GET | `/services/status` | On-demand health probe of every app |

pub mod fanout;
pub mod handlers;
pub mod registry;
pub mod upstream;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use loadgrid_core::{GatewayConfig, HealthSettings, HealthStatus, LoadgridResult};
use loadgrid_health::{BoxFuture, HealthCallback, HealthMonitor};

pub use registry::{AppEntry, AppRegistry};
pub use upstream::UpstreamClient;

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: AppRegistry,
    pub client: UpstreamClient,
    pub health: HealthSettings,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(config: &GatewayConfig) -> LoadgridResult<Self> {
        Ok(Self {
            registry: AppRegistry::from_config(config)?,
            client: UpstreamClient::new(config.read_timeout(), config.write_timeout()),
            health: config.health.clone(),
            started_at: Instant::now(),
        })
    }
}

/// Build the gateway router.
pub fn build_router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/apps", get(handlers::list_apps))
        .route("/apps/{name}", get(handlers::get_app))
        .route("/apps/{name}/reset", post(handlers::reset_app))
        .route(
            "/resources",
            get(handlers::list_levels).post(handlers::update_resources),
        )
        .route("/resources/all", post(handlers::update_all))
        .route("/metrics", get(handlers::aggregate_metrics))
        .route("/services/status", get(handlers::services_status))
        .layer(cors)
        .with_state(state)
}

/// A gateway with its health monitor attached.
pub struct Gateway {
    state: GatewayState,
    monitor: HealthMonitor,
}

impl Gateway {
    pub fn new(config: &GatewayConfig) -> LoadgridResult<Self> {
        config.validate()?;
        let state = GatewayState::new(config)?;
        let monitor = HealthMonitor::new(config.health.clone())
            .with_callback(registry_callback(state.registry.clone()));
        Ok(Self { state, monitor })
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start one health loop per registered app.
    pub async fn start_health_monitors(&self) {
        let endpoints = self.state.registry.endpoints().await;
        let count = endpoints.len();
        for (app, base) in endpoints {
            self.monitor.start_monitor(&app, base).await;
        }
        info!(apps = count, "health monitoring started");
    }

    pub async fn shutdown(&self) {
        self.monitor.stop_all().await;
    }
}

/// Health callback that writes every probe outcome into the registry.
fn registry_callback(registry: AppRegistry) -> HealthCallback {
    Arc::new(move |app: String, status: HealthStatus| -> BoxFuture {
        let registry = registry.clone();
        Box::pin(async move {
            if let Err(e) = registry.record_health(&app, status).await {
                debug!(%app, error = %e, "health result for unregistered app");
            }
        })
    })
}
