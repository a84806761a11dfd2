//! Startup error types.

use repairdesk_core::error::RepairError;
use repairdesk_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Repair(#[from] RepairError),

    #[error("cannot listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}
