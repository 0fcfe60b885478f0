//! Switchboard server binary.
//!
//! Usage:
//!   switchboard --config config.toml
//!   switchboard --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `APP_HOST` - Server bind address (default: 127.0.0.1)
//! - `APP_PORT` - Server port (default: 8000)
//! - `OPENAI_API_KEY` - Key for the chat model
//! - `WEATHER_API_KEY`, `NEWS_API_KEY` - Keys for the weather and news tools

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use switchboard_api::{serve, AppState};
use switchboard_coordinator::{Coordinator, CoordinatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "switchboard", version, about = "Multi-handler query router")]
struct Args {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides the config file
    #[arg(short, long, env = "APP_HOST")]
    bind: Option<String>,

    /// Port to listen on, overrides the config file
    #[arg(short, long, env = "APP_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,switchboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Loading configuration");
        CoordinatorConfig::from_file(path)?
    } else {
        tracing::info!("Using default configuration");
        CoordinatorConfig::default()
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if config.server.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0. This exposes the API to all network interfaces; \
             ensure a firewall is in place."
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    let coordinator = Arc::new(Coordinator::with_default_handlers(config));
    coordinator.initialize().await?;

    serve(Arc::new(AppState::new(coordinator)), addr).await?;

    Ok(())
}
