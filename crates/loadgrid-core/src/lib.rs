//! loadgrid-core — shared vocabulary for the loadgrid demo services.
//!
//! Workers and the gateway speak the same JSON contract. This crate owns
//! that contract: resource kinds and level sets, the metric snapshot a
//! worker fabricates, health status, the error kinds every endpoint maps
//! onto, and the `loadgrid.toml` configuration file.
//!
//! # Layout
//!
//! ```text
//! types   — ResourceKind, LevelSet, LevelUpdate, MetricSnapshot, HealthStatus
//! error   — LoadgridError (validation / not found / upstream unavailable)
//! config  — GatewayConfig, AppConfig, WorkerConfig, duration parsing
//! ```

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, DEFAULT_MAX_INSTANCES, GatewayConfig, GatewaySettings, HealthSettings, WorkerConfig,
    parse_duration,
};
pub use error::{LoadgridError, LoadgridResult};
pub use types::*;
