mod config;
mod credentials;
mod db;
mod error;
mod matching;
mod notify;
mod scheduling;
mod server;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::PortalConfig;
use crate::db::PortalDbManager;
use crate::types::PortalState;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON configuration file, merged over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = PortalConfig::load(args.config.as_deref()).context("reading configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.as_str().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Arc::new(
        PortalDbManager::open(&config.database_path)
            .with_context(|| format!("opening database {}", config.database_path))?,
    );
    info!("Opened database at {}", config.database_path);

    match &config.admin {
        Some(seed) => {
            let admin_id = db
                .upsert_admin(
                    &seed.email.trim().to_lowercase(),
                    &seed.name,
                    &credentials::hash_password(&seed.password),
                )
                .context("seeding admin account")?;
            info!("Admin account {} ready (admin-{admin_id})", seed.email);
        }
        None => warn!("No admin account configured"),
    }

    let address = config.bind_address();
    let state = Arc::new(PortalState::new(db, config));
    let app = server::create_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
