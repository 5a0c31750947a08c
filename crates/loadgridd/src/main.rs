//! loadgridd — the loadgrid daemon.
//!
//! One binary, two roles:
//! - `worker`: a simulated business app exposing its resource model
//! - `gateway`: the registry, update forwarding, and metric aggregation
//!   in front of every worker
//!
//! # Usage
//!
//! ```text
//! loadgridd worker --name user_management --port 8001
//! loadgridd gateway --port 8000 --config loadgrid.toml
//! loadgridd show-config --config loadgrid.toml
//! ```

mod gateway_mode;
mod worker_mode;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use loadgrid_core::{DEFAULT_MAX_INSTANCES, WorkerConfig};

const DEFAULT_LOG_FILTER: &str = "info,loadgridd=debug,loadgrid=debug";

#[derive(Parser)]
#[command(name = "loadgridd", about = "loadgrid daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run one simulated business app.
    Worker {
        /// App name reported in every response.
        #[arg(long, env = "LOADGRID_APP_NAME", default_value = "microservice")]
        name: String,

        /// Port to listen on.
        #[arg(long, env = "PORT", default_value = "8001")]
        port: u16,

        /// Instance count reported at full load.
        #[arg(long, default_value_t = DEFAULT_MAX_INSTANCES)]
        max_instances: u32,

        /// Instance count reported by the hosting platform.
        #[arg(long, env = "PLATFORM_INSTANCE_COUNT")]
        platform_instance_count: Option<u32>,
    },

    /// Run the gateway in front of the configured apps.
    Gateway {
        /// Port to listen on.
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Path to loadgrid.toml. The built-in demo apps are used without one.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective gateway configuration as TOML.
    ShowConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Worker {
            name,
            port,
            max_instances,
            platform_instance_count,
        } => {
            worker_mode::run_worker(WorkerConfig {
                app_name: name,
                port,
                max_instances,
                platform_instance_count,
            })
            .await
        }
        Command::Gateway { port, config } => gateway_mode::run_gateway(port, config).await,
        Command::ShowConfig { config } => {
            let config = gateway_mode::load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolves on Ctrl-C.
pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
