//! loadgrid-worker — HTTP surface of one business app.
//!
//! Every business app (user management, payments, inventory, ...) is the
//! same worker with a different name. It owns one `ResourceModel` and
//! exposes it over JSON.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Service banner |
//! | GET | `/health` | Liveness |
//! | GET | `/metrics` | Current metric snapshot |
//! | GET | `/system` | Alias of `/metrics` |
//! | GET | `/resources` | Current levels, without touching counters |
//! | POST | `/resources` | Replace the levels; omitted kinds become 0 |
//! | POST | `/resources/reset` | Reset all levels to 0 |
//! | POST | `/reset-metrics` | Zero the request and error counters |

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use loadgrid_core::WorkerConfig;
use loadgrid_sim::{ModelSettings, ResourceModel};

/// Shared state for worker handlers.
#[derive(Clone)]
pub struct WorkerState {
    pub model: Arc<ResourceModel>,
    pub started_at: Instant,
}

impl WorkerState {
    pub fn new(model: ResourceModel) -> Self {
        Self {
            model: Arc::new(model),
            started_at: Instant::now(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(ResourceModel::new(
            config.app_name.clone(),
            ModelSettings::from(config),
        ))
    }
}

/// Build the worker router.
pub fn build_router(state: WorkerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/system", get(handlers::metrics))
        .route(
            "/resources",
            get(handlers::get_resources).post(handlers::update_resources),
        )
        .route("/resources/reset", post(handlers::reset_resources))
        .route("/reset-metrics", post(handlers::reset_metrics))
        .layer(cors)
        .with_state(state)
}
