use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gatekeeper::admin::serve_admin;
use api_gatekeeper::config::watcher::ConfigWatcher;
use api_gatekeeper::config::{load_config, GatekeeperConfig};
use api_gatekeeper::lifecycle::signals::wait_for_signal;
use api_gatekeeper::observability::{logging, metrics};
use api_gatekeeper::{GatekeeperServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-gatekeeper")]
#[command(about = "Rate limiting and signature verification in front of an HTTP API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatekeeperConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gatekeeper starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        signature_enabled = config.signature.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    // Without a file there is nothing to watch; the sender stays alive so the
    // reload loop idles until shutdown.
    let (reloads_tx, reloads) = tokio::sync::mpsc::unbounded_channel();
    let (_watcher, reloads) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        None => (None, reloads),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin = config.admin.clone();
    let server = GatekeeperServer::new(config).await;

    if admin.enabled {
        let admin_listener = TcpListener::bind(&admin.bind_address).await?;
        let state = server.state().clone();
        let admin_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(state, admin_listener, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    server.run(listener, reloads, shutdown).await?;
    drop(reloads_tx);

    tracing::info!("Shutdown complete");
    Ok(())
}
