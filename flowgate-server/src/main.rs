//! # flowgate-server
//!
//! The flowgate web server.
//!
//! On startup the server:
//! - Loads `conf/flowgate.toml` (over `conf/flowgate.private.toml`)
//! - Builds the user, project, executor, SLA and schedule subsystems
//! - Registers them with the management bridge
//! - Mounts the viewer plugins found under `viewer.plugin.dir`
//! - Starts the JSON-RPC listener
//!
//! ## Running
//!
//! ```bash
//! flowgate-server --home /srv/flowgate
//!
//! # With debug logging
//! RUST_LOG=debug flowgate-server --conf /etc/flowgate
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use flowgate_server::api;
use flowgate_server::config::{self, KEY_LOG_LEVEL};
use flowgate_server::{AppContext, LifecycleCoordinator};

#[derive(Parser, Debug)]
#[command(name = "flowgate-server")]
#[command(about = "Job orchestration web server", long_about = None)]
#[command(version)]
struct Args {
    /// Server home directory; configuration is read from <home>/conf
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Configuration directory, overriding --home
    #[arg(long, value_name = "DIR")]
    conf: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let conf_dir = config::resolve_conf_dir(args.home.as_deref(), args.conf.as_deref())?;
    let props = config::load_server_props(&conf_dir)
        .with_context(|| format!("Failed to load configuration from {}", conf_dir.display()))?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(props.get_string_or(KEY_LOG_LEVEL, "info")?),
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Still single-threaded here; the runtime is built below.
    if let Some(tz) = config::timezone_setting(&props)? {
        std::env::set_var("TZ", &tz);
        info!("Setting timezone to {}", tz);
    }

    info!("Starting flowgate-server v{}", env!("CARGO_PKG_VERSION"));

    let coordinator = LifecycleCoordinator::with_defaults(props);
    let context = match coordinator.start() {
        Ok(context) => context,
        Err(e) => {
            error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;
    runtime.block_on(serve(&coordinator, context))
}

async fn serve(coordinator: &LifecycleCoordinator, context: Arc<AppContext>) -> Result<()> {
    let (server_handle, addr) = match api::start_server(context).await {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start listener: {:#}", e);
            coordinator.shutdown();
            std::process::exit(1);
        }
    };

    info!("Server running on {}", addr);
    info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    let report = coordinator.shutdown();
    if !report.is_clean() {
        error!("Shutdown completed with errors");
    }

    server_handle.stop()?;
    server_handle.stopped().await;

    info!("Server stopped");
    Ok(())
}
