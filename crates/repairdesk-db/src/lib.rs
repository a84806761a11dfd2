//! RepairDesk Database — SurrealDB connection management, schema
//! migrations and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Implementations of every `repairdesk-core` repository trait, bundled
//!   as a [`SurrealStore`]

mod connection;
mod error;
pub mod repository;
mod schema;
mod store;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{
    SurrealAuditLogRepository, SurrealCustomerRepository, SurrealDeviceRepository,
    SurrealIdentityRepository, SurrealPermissionRepository, SurrealServiceCaseRepository,
    SurrealServiceRoundRepository, SurrealShipmentRepository,
};
pub use schema::{latest_version, run_migrations};
pub use store::SurrealStore;
