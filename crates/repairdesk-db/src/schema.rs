//! Schema definitions and migration runner for SurrealDB.
//!
//! Every table is SCHEMAFULL. Record ids and foreign keys are UUID strings;
//! enumerations are stored as their SCREAMING_SNAKE names and checked with
//! ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "identities_and_registry",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "case_lifecycle",
        sql: SCHEMA_V2,
    },
    Migration {
        version: 3,
        name: "daily_case_counter",
        sql: SCHEMA_V3,
    },
];

// -----------------------------------------------------------------------
// Schema v1: identities, grants, customers, devices, audit log
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Identities
-- =======================================================================
DEFINE TABLE identity SCHEMAFULL;
DEFINE FIELD username ON TABLE identity TYPE string;
DEFINE FIELD email ON TABLE identity TYPE option<string>;
DEFINE FIELD phone ON TABLE identity TYPE option<string>;
DEFINE FIELD role ON TABLE identity TYPE string \
    ASSERT $value IN ['ADMIN', 'STAFF', 'CUSTOMER'];
DEFINE FIELD status ON TABLE identity TYPE string \
    ASSERT $value IN ['ACTIVE', 'DISABLED'];
DEFINE FIELD password_hash ON TABLE identity TYPE string;
DEFINE FIELD customer_id ON TABLE identity TYPE option<string>;
DEFINE FIELD created_at ON TABLE identity TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE identity TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_identity_username ON TABLE identity \
    COLUMNS username UNIQUE;
DEFINE INDEX idx_identity_role ON TABLE identity COLUMNS role, status;

-- =======================================================================
-- Staff capability grants
-- =======================================================================
DEFINE TABLE staff_permission SCHEMAFULL;
DEFINE FIELD staff_id ON TABLE staff_permission TYPE string;
DEFINE FIELD capability ON TABLE staff_permission TYPE string \
    ASSERT $value IN ['CASE_READ_ALL', 'CASE_READ_ASSIGNED', 'CASE_WRITE', \
    'DEVICE_READ', 'DEVICE_WRITE', 'CUSTOMER_READ_ALL', 'CUSTOMER_WRITE', \
    'SHIPMENT_READ', 'SHIPMENT_WRITE', 'AUDIT_READ'];
DEFINE FIELD granted_by ON TABLE staff_permission TYPE string;
DEFINE FIELD granted_at ON TABLE staff_permission TYPE datetime;
DEFINE INDEX idx_staff_permission_unique ON TABLE staff_permission \
    COLUMNS staff_id, capability UNIQUE;

-- =======================================================================
-- Customers
-- =======================================================================
DEFINE TABLE customer SCHEMAFULL;
DEFINE FIELD name ON TABLE customer TYPE string;
DEFINE FIELD phone ON TABLE customer TYPE option<string>;
DEFINE FIELD email ON TABLE customer TYPE option<string>;
DEFINE FIELD address ON TABLE customer TYPE option<string>;
DEFINE FIELD identity_id ON TABLE customer TYPE option<string>;
DEFINE FIELD created_at ON TABLE customer TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE customer TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_customer_identity ON TABLE customer \
    COLUMNS identity_id;

-- =======================================================================
-- Devices
-- =======================================================================
DEFINE TABLE device SCHEMAFULL;
DEFINE FIELD customer_id ON TABLE device TYPE string;
DEFINE FIELD brand ON TABLE device TYPE string;
DEFINE FIELD model ON TABLE device TYPE string;
DEFINE FIELD imei ON TABLE device TYPE option<string>;
DEFINE FIELD serial ON TABLE device TYPE option<string>;
DEFINE FIELD color ON TABLE device TYPE option<string>;
DEFINE FIELD storage ON TABLE device TYPE option<string>;
DEFINE FIELD notes ON TABLE device TYPE option<string>;
DEFINE FIELD created_at ON TABLE device TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE device TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_device_customer ON TABLE device COLUMNS customer_id;

-- =======================================================================
-- Audit log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource_type ON TABLE audit_log TYPE string;
DEFINE FIELD resource_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD details ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD user_agent ON TABLE audit_log TYPE option<string>;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime;
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_actor ON TABLE audit_log COLUMNS actor_id;
";

// -----------------------------------------------------------------------
// Schema v2: cases, rounds, status events, shipments
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Service cases
-- =======================================================================
DEFINE TABLE service_case SCHEMAFULL;
DEFINE FIELD device_id ON TABLE service_case TYPE string;
DEFINE FIELD case_number ON TABLE service_case TYPE string;
DEFINE FIELD day_key ON TABLE service_case TYPE string;
DEFINE FIELD title ON TABLE service_case TYPE string;
DEFINE FIELD description ON TABLE service_case TYPE option<string>;
DEFINE FIELD created_at ON TABLE service_case TYPE datetime;
DEFINE FIELD closed_at ON TABLE service_case TYPE option<datetime>;
DEFINE FIELD updated_at ON TABLE service_case TYPE datetime;
DEFINE INDEX idx_case_number ON TABLE service_case \
    COLUMNS case_number UNIQUE;
DEFINE INDEX idx_case_day ON TABLE service_case COLUMNS day_key;
DEFINE INDEX idx_case_device ON TABLE service_case COLUMNS device_id;

-- =======================================================================
-- Service rounds
-- =======================================================================
DEFINE TABLE service_round SCHEMAFULL;
DEFINE FIELD case_id ON TABLE service_round TYPE string;
DEFINE FIELD round_no ON TABLE service_round TYPE int ASSERT $value >= 1;
DEFINE FIELD issue ON TABLE service_round TYPE string;
DEFINE FIELD diagnosis ON TABLE service_round TYPE option<string>;
DEFINE FIELD resolution ON TABLE service_round TYPE option<string>;
DEFINE FIELD cost ON TABLE service_round TYPE option<string>;
DEFINE FIELD warranty_days ON TABLE service_round TYPE option<int>;
DEFINE FIELD status ON TABLE service_round TYPE string \
    ASSERT $value IN ['PENDING', 'RECEIVED', 'DIAGNOSING', \
    'AWAITING_PARTS', 'REPAIRING', 'QA', 'READY_TO_SHIP', 'SHIPPING', \
    'DELIVERED', 'CLOSED', 'RETURNED', 'CANCELLED'];
DEFINE FIELD started_at ON TABLE service_round TYPE datetime;
DEFINE FIELD completed_at ON TABLE service_round TYPE option<datetime>;
DEFINE FIELD updated_at ON TABLE service_round TYPE datetime;
DEFINE INDEX idx_round_case_no ON TABLE service_round \
    COLUMNS case_id, round_no UNIQUE;

-- =======================================================================
-- Status events (append-only)
-- =======================================================================
DEFINE TABLE status_event SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD round_id ON TABLE status_event TYPE string;
DEFINE FIELD from_status ON TABLE status_event TYPE option<string>;
DEFINE FIELD to_status ON TABLE status_event TYPE string;
DEFINE FIELD notes ON TABLE status_event TYPE option<string>;
DEFINE FIELD location ON TABLE status_event TYPE option<string>;
DEFINE FIELD operator_id ON TABLE status_event TYPE string;
DEFINE FIELD created_at ON TABLE status_event TYPE datetime;
DEFINE INDEX idx_event_round ON TABLE status_event COLUMNS round_id;
DEFINE INDEX idx_event_operator ON TABLE status_event COLUMNS operator_id;

-- =======================================================================
-- Shipments
-- =======================================================================
DEFINE TABLE shipment SCHEMAFULL;
DEFINE FIELD round_id ON TABLE shipment TYPE string;
DEFINE FIELD direction ON TABLE shipment TYPE string \
    ASSERT $value IN ['INBOUND', 'OUTBOUND'];
DEFINE FIELD carrier ON TABLE shipment TYPE option<string>;
DEFINE FIELD tracking_number ON TABLE shipment TYPE option<string>;
DEFINE FIELD origin ON TABLE shipment TYPE option<string>;
DEFINE FIELD destination ON TABLE shipment TYPE option<string>;
DEFINE FIELD notes ON TABLE shipment TYPE option<string>;
DEFINE FIELD status ON TABLE shipment TYPE string \
    ASSERT $value IN ['PENDING', 'IN_TRANSIT', 'ARRIVED', 'SIGNED'];
DEFINE FIELD current_location ON TABLE shipment TYPE option<string>;
DEFINE FIELD estimated_arrival ON TABLE shipment TYPE option<datetime>;
DEFINE FIELD shipped_at ON TABLE shipment TYPE option<datetime>;
DEFINE FIELD actual_arrival ON TABLE shipment TYPE option<datetime>;
DEFINE FIELD operator_id ON TABLE shipment TYPE string;
DEFINE FIELD created_at ON TABLE shipment TYPE datetime;
DEFINE FIELD updated_at ON TABLE shipment TYPE datetime;
DEFINE INDEX idx_shipment_round ON TABLE shipment COLUMNS round_id;
";

// -----------------------------------------------------------------------
// Schema v3: per-day case number counter
// -----------------------------------------------------------------------

// Keyed by day key (`YYYYMMDD`). Seeded from cases stored before the
// counter existed.
const SCHEMA_V3: &str = "\
DEFINE TABLE case_counter SCHEMAFULL;
DEFINE FIELD seq ON TABLE case_counter TYPE int ASSERT $value >= 0;

FOR $day IN (SELECT day_key, count() AS total FROM service_case GROUP BY day_key) {
    UPSERT type::record('case_counter', $day.day_key) SET seq = $day.total;
};
";

/// Apply all pending migrations in version order.
///
/// Safe to call on every start: applied versions are tracked in the
/// `_migration` table and skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
