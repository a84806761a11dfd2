//! SurrealDB repository implementations.

mod audit;
mod case;
mod customer;
mod device;
mod identity;
mod permission;
mod round;
mod shipment;

pub use audit::SurrealAuditLogRepository;
pub use case::SurrealServiceCaseRepository;
pub use customer::SurrealCustomerRepository;
pub use device::SurrealDeviceRepository;
pub use identity::SurrealIdentityRepository;
pub use permission::SurrealPermissionRepository;
pub use round::SurrealServiceRoundRepository;
pub use shipment::SurrealShipmentRepository;

use chrono::{DateTime, Utc};
use repairdesk_core::models::DateRange;
use surrealdb_types::SurrealValue;

/// Row struct for `SELECT count() AS total ... GROUP ALL` queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

pub(crate) fn first_total(rows: Vec<CountRow>) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

/// Appends the bounds of `range` on `column` to a WHERE clause list.
///
/// Binds are named `$range_from` and `$range_to`; see [`range_binds`].
pub(crate) fn push_range(conditions: &mut Vec<String>, column: &str, range: &DateRange) {
    if range.from.is_some() {
        conditions.push(format!("{column} >= $range_from"));
    }
    if range.to.is_some() {
        conditions.push(format!("{column} <= $range_to"));
    }
}

pub(crate) fn range_binds(range: &DateRange) -> [(&'static str, Option<DateTime<Utc>>); 2] {
    [("range_from", range.from), ("range_to", range.to)]
}

pub(crate) fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}
