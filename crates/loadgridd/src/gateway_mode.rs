//! Gateway mode — registry, forwarding, and aggregation.
//!
//! On startup the daemon:
//! 1. Loads `loadgrid.toml` (or the built-in demo apps)
//! 2. Applies `LOADGRID_<APP>_URL` overrides and validates the result
//! 3. Starts one health loop per app
//! 4. Serves the gateway API until Ctrl-C, then stops the health loops

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use loadgrid_core::GatewayConfig;
use loadgrid_gateway::Gateway;

/// Load, override from the environment, and validate the gateway config.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GatewayConfig> {
    let mut config = match path {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::builtin(),
    };
    config.apply_env_overrides(std::env::vars());
    config.validate()?;
    Ok(config)
}

pub async fn run_gateway(port: u16, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    info!("loadgrid gateway starting");

    let config = load_config(config_path.as_deref())?;
    for app in &config.apps {
        info!(app = %app.name, url = %app.url, "app registered");
    }

    let gateway = Gateway::new(&config)?;
    gateway.start_health_monitors().await;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, apps = config.apps.len(), "gateway listening");

    axum::serve(listener, gateway.router())
        .with_graceful_shutdown(crate::shutdown_signal())
        .await?;

    gateway.shutdown().await;
    info!("loadgrid gateway stopped");
    Ok(())
}
