//! Worker mode — serves one simulated business app.

use std::net::SocketAddr;

use tracing::info;

use loadgrid_core::WorkerConfig;
use loadgrid_worker::{WorkerState, build_router};

pub async fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    info!(
        app = %config.app_name,
        max_instances = config.max_instances,
        platform_instances = ?config.platform_instance_count,
        "loadgrid worker starting"
    );

    let router = build_router(WorkerState::from_config(&config));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, app = %config.app_name, "worker listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(crate::shutdown_signal())
        .await?;

    info!(app = %config.app_name, "worker stopped");
    Ok(())
}
