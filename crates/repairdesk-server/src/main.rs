//! RepairDesk Server — application entry point.
//!
//! Loads configuration, connects to SurrealDB, applies migrations and
//! makes sure an administrator exists, then runs until interrupted.

mod config;
mod error;

use std::sync::Arc;

use repairdesk_core::clock::SystemClock;
use repairdesk_db::DbManager;
use repairdesk_service::RepairDesk;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::error::ServerError;

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repairdesk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "RepairDesk server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    info!("Starting RepairDesk server...");

    let config = AppConfig::load()?;

    let manager = DbManager::open(&config.db).await?;

    let bootstrap = config.service.bootstrap_admin.clone();
    let desk = RepairDesk::new(
        manager.store(),
        Arc::new(SystemClock),
        config.service,
    );

    match bootstrap {
        Some(admin) => {
            if desk.identities.ensure_admin(&admin).await?.is_none() {
                info!("Administrator already present, bootstrap skipped");
            }
        }
        None => warn!("No bootstrap administrator configured"),
    }

    info!("RepairDesk server ready");
    tokio::signal::ctrl_c().await.map_err(ServerError::Signal)?;

    info!("RepairDesk server stopped.");
    Ok(())
}
