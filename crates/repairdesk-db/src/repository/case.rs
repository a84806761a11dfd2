//! SurrealDB implementation of [`ServiceCaseRepository`].
//!
//! Case numbers are `CS` + UTC day + daily sequence. The sequence comes
//! from a `case_counter` record per day key. Creations through one
//! repository are serialized on an allocation lock; writers in other
//! processes that move the counter first, or take the number through the
//! unique index on `case_number`, surface as `Conflict`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::DateRange;
use repairdesk_core::models::round::ServiceRound;
use repairdesk_core::models::service_case::{
    CaseFilter, CreateServiceCase, ServiceCase, UpdateServiceCase, compose_case_number, day_key,
};
use repairdesk_core::repository::{PaginatedResult, Pagination, ServiceCaseRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::round::select_round;
use super::{CountRow, first_total, push_range, range_binds, where_clause};
use crate::error::{DbError, parse_uuid};

const SELECT_CASE: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('service_case', $id)";

const CASE_ORDER: &str = "ORDER BY created_at DESC, case_number DESC";

#[derive(Debug, SurrealValue)]
struct CaseRow {
    record_id: String,
    device_id: String,
    case_number: String,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl CaseRow {
    fn try_into_case(self) -> Result<ServiceCase, DbError> {
        Ok(ServiceCase {
            id: parse_uuid("service_case", &self.record_id)?,
            device_id: parse_uuid("device", &self.device_id)?,
            case_number: self.case_number,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            closed_at: self.closed_at,
            updated_at: self.updated_at,
        })
    }
}

fn filter_conditions(filter: &CaseFilter) -> Vec<String> {
    let mut conditions = Vec::new();
    if filter.search.is_some() {
        conditions.push(
            "(string::lowercase(case_number) CONTAINS $search \
             OR string::lowercase(title) CONTAINS $search \
             OR string::lowercase(type::record('device', device_id).brand ?? '') \
             CONTAINS $search \
             OR string::lowercase(type::record('device', device_id).model ?? '') \
             CONTAINS $search \
             OR string::lowercase(type::record('device', device_id).imei ?? '') \
             CONTAINS $search)"
                .to_string(),
        );
    }
    if filter.customer_id.is_some() {
        conditions.push("type::record('device', device_id).customer_id = $customer_id".to_string());
    }
    push_range(&mut conditions, "created_at", &filter.created);
    conditions
}

#[derive(Clone)]
pub struct SurrealServiceCaseRepository<C: Connection> {
    db: Surreal<C>,
    /// Shared by clones; held from counter read to commit.
    allocation: Arc<Mutex<()>>,
}

impl<C: Connection> SurrealServiceCaseRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            allocation: Arc::new(Mutex::new(())),
        }
    }

    async fn fetch(&self, id: Uuid) -> RepairResult<ServiceCase> {
        let mut result = self
            .db
            .query(SELECT_CASE)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CaseRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("service_case", id))?;

        Ok(row.try_into_case()?)
    }

    async fn cases_for_device(
        &self,
        device_id: Uuid,
        limit: Option<u64>,
    ) -> RepairResult<Vec<ServiceCase>> {
        let limit_clause = if limit.is_some() { "LIMIT $limit" } else { "" };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM service_case \
             WHERE device_id = $device_id {CASE_ORDER} {limit_clause}"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("device_id", device_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CaseRow> = result.take(0).map_err(DbError::from)?;
        let cases = rows
            .into_iter()
            .map(CaseRow::try_into_case)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(cases)
    }

    async fn count_where(&self, conditions: &[String], range: &DateRange) -> RepairResult<u64> {
        let query = format!(
            "SELECT count() AS total FROM service_case {} GROUP ALL",
            where_clause(conditions)
        );
        let mut builder = self.db.query(&query);
        for bind in range_binds(range) {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_total(rows))
    }
}

impl<C: Connection> ServiceCaseRepository for SurrealServiceCaseRepository<C> {
    async fn create_with_first_round(
        &self,
        input: CreateServiceCase,
    ) -> RepairResult<(ServiceCase, ServiceRound)> {
        let date = input.opened_at.date_naive();
        let key = day_key(date);

        let _allocation = self.allocation.lock().await;

        let mut result = self
            .db
            .query("RETURN type::record('case_counter', $day_key).seq ?? 0")
            .bind(("day_key", key.clone()))
            .await
            .map_err(DbError::from)?;
        let previous: Option<i64> = result.take(0).map_err(DbError::from)?;
        let previous = previous.unwrap_or(0);
        let sequence = u32::try_from(previous + 1)
            .map_err(|_| DbError::Query(format!("daily case sequence overflow on {key}")))?;
        let case_number = compose_case_number(date, sequence);

        let case_id = Uuid::new_v4();
        let round_id = Uuid::new_v4();

        debug!(%case_number, "Creating service case");

        // The counter guard comes first so a moved counter is the reported error.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 IF (type::record('case_counter', $day_key).seq ?? 0) != $previous { \
                     THROW 'sequence conflict: daily case counter moved' \
                 }; \
                 UPSERT type::record('case_counter', $day_key) SET seq = $sequence; \
                 CREATE type::record('service_case', $case_id) SET \
                 device_id = $device_id, case_number = $case_number, \
                 day_key = $day_key, title = $title, \
                 description = $description, created_at = $at, \
                 updated_at = $at; \
                 CREATE type::record('service_round', $round_id) SET \
                 case_id = $case_id, round_no = 1, issue = $issue, \
                 status = 'PENDING', started_at = $at, updated_at = $at; \
                 COMMIT TRANSACTION;",
            )
            .bind(("case_id", case_id.to_string()))
            .bind(("round_id", round_id.to_string()))
            .bind(("device_id", input.device_id.to_string()))
            .bind(("case_number", case_number))
            .bind(("day_key", key))
            .bind(("previous", previous))
            .bind(("sequence", i64::from(sequence)))
            .bind(("title", input.title))
            .bind(("description", input.description))
            .bind(("issue", input.issue))
            .bind(("at", input.opened_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let case = self.fetch(case_id).await?;
        let round = select_round(&self.db, round_id).await?;
        Ok((case, round))
    }

    async fn get_by_id(&self, id: Uuid) -> RepairResult<ServiceCase> {
        self.fetch(id).await
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateServiceCase,
        at: DateTime<Utc>,
    ) -> RepairResult<ServiceCase> {
        let mut sets = Vec::new();
        if input.title.is_some() {
            sets.push("title = $title");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = $at");

        let query = format!(
            "UPDATE type::record('service_case', $id) SET {}; {SELECT_CASE};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("at", at));
        if let Some(title) = input.title {
            builder = builder.bind(("title", title));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<CaseRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("service_case", id))?;

        Ok(row.try_into_case()?)
    }

    async fn close(&self, id: Uuid, at: DateTime<Utc>) -> RepairResult<ServiceCase> {
        let query = format!(
            "UPDATE type::record('service_case', $id) SET \
             closed_at = closed_at ?? $at, updated_at = $at; {SELECT_CASE};"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<CaseRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("service_case", id))?;

        Ok(row.try_into_case()?)
    }

    async fn list(
        &self,
        filter: CaseFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<ServiceCase>> {
        let clause = where_clause(&filter_conditions(&filter));
        let query = format!(
            "SELECT count() AS total FROM service_case {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM service_case {clause} \
             {CASE_ORDER} LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("search", filter.search.map(|s| s.to_lowercase())))
            .bind(("customer_id", filter.customer_id.map(|id| id.to_string())))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in range_binds(&filter.created) {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<CaseRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(CaseRow::try_into_case)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: first_total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_for_device(&self, device_id: Uuid) -> RepairResult<Vec<ServiceCase>> {
        self.cases_for_device(device_id, None).await
    }

    async fn latest_for_device(&self, device_id: Uuid) -> RepairResult<Option<ServiceCase>> {
        Ok(self
            .cases_for_device(device_id, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn count(&self, created: DateRange) -> RepairResult<u64> {
        let mut conditions = Vec::new();
        push_range(&mut conditions, "created_at", &created);
        self.count_where(&conditions, &created).await
    }

    async fn count_open(&self) -> RepairResult<u64> {
        self.count_where(&["closed_at = NONE".to_string()], &DateRange::default())
            .await
    }
}
