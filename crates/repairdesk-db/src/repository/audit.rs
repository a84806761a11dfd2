//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The `audit_log` table only permits create and select; entries are never
//! rewritten.

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::audit::{AuditLogEntry, AuditLogFilter, CreateAuditLogEntry};
use repairdesk_core::repository::{AuditFacets, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, first_total, push_range, range_binds, where_clause};
use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    actor_id: String,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: serde_json::Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry {
            id: parse_uuid("audit_log", &self.record_id)?,
            actor_id: parse_uuid("actor", &self.actor_id)?,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct ActionRow {
    action: String,
}

#[derive(Debug, SurrealValue)]
struct ResourceTypeRow {
    resource_type: String,
}

fn filter_conditions(filter: &AuditLogFilter) -> Vec<String> {
    let mut conditions = Vec::new();
    if filter.actor_id.is_some() {
        conditions.push("actor_id = $actor_id".to_string());
    }
    if filter.action.is_some() {
        conditions.push("action = $action".to_string());
    }
    if filter.resource_type.is_some() {
        conditions.push("resource_type = $resource_type".to_string());
    }
    push_range(&mut conditions, "timestamp", &filter.range);
    conditions
}

fn filter_binds(filter: &AuditLogFilter) -> [(&'static str, Option<String>); 3] {
    [
        ("actor_id", filter.actor_id.map(|id| id.to_string())),
        ("action", filter.action.clone()),
        ("resource_type", filter.resource_type.clone()),
    ]
}

#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> RepairResult<AuditLogEntry> {
        let id = Uuid::new_v4();

        let mut result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor_id = $actor_id, action = $action, \
                 resource_type = $resource_type, resource_id = $resource_id, \
                 details = $details, ip_address = $ip_address, \
                 user_agent = $user_agent, timestamp = $timestamp; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id.to_string()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("action", input.action.as_str().to_string()))
            .bind(("resource_type", input.resource_type))
            .bind(("resource_id", input.resource_id))
            .bind(("details", input.details))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("timestamp", input.timestamp))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("audit_log", id))?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<AuditLogEntry>> {
        let clause = where_clause(&filter_conditions(&filter));
        let query = format!(
            "SELECT count() AS total FROM audit_log {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log {clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in filter_binds(&filter) {
            builder = builder.bind(bind);
        }
        for bind in range_binds(&filter.range) {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(AuditRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: first_total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn facets(&self, filter: AuditLogFilter) -> RepairResult<AuditFacets> {
        let clause = where_clause(&filter_conditions(&filter));
        let query = format!(
            "SELECT action FROM audit_log {clause} GROUP BY action ORDER BY action; \
             SELECT resource_type FROM audit_log {clause} \
             GROUP BY resource_type ORDER BY resource_type;"
        );

        let mut builder = self.db.query(&query);
        for bind in filter_binds(&filter) {
            builder = builder.bind(bind);
        }
        for bind in range_binds(&filter.range) {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let actions: Vec<ActionRow> = result.take(0).map_err(DbError::from)?;
        let resource_types: Vec<ResourceTypeRow> = result.take(1).map_err(DbError::from)?;

        Ok(AuditFacets {
            actions: actions.into_iter().map(|r| r.action).collect(),
            resource_types: resource_types.into_iter().map(|r| r.resource_type).collect(),
        })
    }
}
