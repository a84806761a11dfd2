//! SurrealDB implementation of [`PermissionRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::capability::{Capability, PermissionGrant};
use repairdesk_core::repository::PermissionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_enum, parse_uuid};

#[derive(Debug, SurrealValue)]
struct GrantRow {
    staff_id: String,
    capability: String,
    granted_by: String,
    granted_at: DateTime<Utc>,
}

impl GrantRow {
    fn try_into_grant(self) -> Result<PermissionGrant, DbError> {
        Ok(PermissionGrant {
            staff_id: parse_uuid("staff", &self.staff_id)?,
            capability: parse_enum(&self.capability)?,
            granted_by: parse_uuid("granted_by", &self.granted_by)?,
            granted_at: self.granted_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn replace_grants(
        &self,
        staff_id: Uuid,
        capabilities: Vec<Capability>,
        granted_by: Uuid,
        granted_at: DateTime<Utc>,
    ) -> RepairResult<Vec<PermissionGrant>> {
        let capabilities: Vec<String> = capabilities
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|c| c.as_str().to_string())
            .collect();

        debug!(%staff_id, count = capabilities.len(), "Replacing staff grants");

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE staff_permission WHERE staff_id = $staff_id; \
                 FOR $capability IN $capabilities { \
                     CREATE staff_permission SET staff_id = $staff_id, \
                     capability = $capability, granted_by = $granted_by, \
                     granted_at = $granted_at; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("staff_id", staff_id.to_string()))
            .bind(("capabilities", capabilities))
            .bind(("granted_by", granted_by.to_string()))
            .bind(("granted_at", granted_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.list_grants(staff_id).await
    }

    async fn list_grants(&self, staff_id: Uuid) -> RepairResult<Vec<PermissionGrant>> {
        let mut result = self
            .db
            .query(
                "SELECT staff_id, capability, granted_by, granted_at \
                 FROM staff_permission WHERE staff_id = $staff_id \
                 ORDER BY capability ASC",
            )
            .bind(("staff_id", staff_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
        let grants = rows
            .into_iter()
            .map(GrantRow::try_into_grant)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(grants)
    }
}
