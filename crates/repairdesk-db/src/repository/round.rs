//! SurrealDB implementation of [`ServiceRoundRepository`].
//!
//! A status transition is one transaction: the event is appended with its
//! `from_status` read from the round inside the transaction, then the round
//! takes the event's target status.

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::DateRange;
use repairdesk_core::models::round::{
    CreateRound, RoundSnapshot, ServiceRound, TransitionStatus, UpdateRound,
};
use repairdesk_core::models::status_event::{OperatorActivity, StatusEvent};
use repairdesk_core::repository::ServiceRoundRepository;
use rust_decimal::Decimal;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{push_range, range_binds, where_clause};
use crate::error::{DbError, parse_enum, parse_uuid};

/// Thrown by the transition guard; must match the `THROW` literal.
const MISSING_ROUND: &str = "missing record: service_round";

const SELECT_ROUND: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('service_round', $id)";

#[derive(Debug, SurrealValue)]
pub(super) struct RoundRow {
    record_id: String,
    case_id: String,
    round_no: u32,
    issue: String,
    diagnosis: Option<String>,
    resolution: Option<String>,
    cost: Option<String>,
    warranty_days: Option<u32>,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl RoundRow {
    pub(super) fn try_into_round(self) -> Result<ServiceRound, DbError> {
        let cost = self
            .cost
            .as_deref()
            .map(|c| {
                c.parse::<Decimal>()
                    .map_err(|e| DbError::Decode(format!("invalid cost '{c}': {e}")))
            })
            .transpose()?;
        Ok(ServiceRound {
            id: parse_uuid("service_round", &self.record_id)?,
            case_id: parse_uuid("service_case", &self.case_id)?,
            round_no: self.round_no,
            issue: self.issue,
            diagnosis: self.diagnosis,
            resolution: self.resolution,
            cost,
            warranty_days: self.warranty_days,
            status: parse_enum(&self.status)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct EventRow {
    record_id: String,
    round_id: String,
    from_status: Option<String>,
    to_status: String,
    notes: Option<String>,
    location: Option<String>,
    operator_id: String,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn try_into_event(self) -> Result<StatusEvent, DbError> {
        Ok(StatusEvent {
            id: parse_uuid("status_event", &self.record_id)?,
            round_id: parse_uuid("service_round", &self.round_id)?,
            from_status: self.from_status.as_deref().map(parse_enum).transpose()?,
            to_status: parse_enum(&self.to_status)?,
            notes: self.notes,
            location: self.location,
            operator_id: parse_uuid("operator", &self.operator_id)?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct SnapshotRow {
    case_id: String,
    round_no: u32,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, SurrealValue)]
struct OperatorRow {
    operator_id: String,
    total: u64,
}

/// Fetch one round by id; shared with the case repository.
pub(super) async fn select_round<C: Connection>(
    db: &Surreal<C>,
    id: Uuid,
) -> RepairResult<ServiceRound> {
    let mut result = db
        .query(SELECT_ROUND)
        .bind(("id", id.to_string()))
        .await
        .map_err(DbError::from)?;

    let rows: Vec<RoundRow> = result.take(0).map_err(DbError::from)?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| DbError::not_found("service_round", id))?;

    Ok(row.try_into_round()?)
}

#[derive(Clone)]
pub struct SurrealServiceRoundRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceRoundRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select_event(&self, id: Uuid) -> RepairResult<StatusEvent> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('status_event', $id)",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("status_event", id))?;

        Ok(row.try_into_event()?)
    }

    async fn events_for_round(
        &self,
        round_id: Uuid,
        limit: Option<u64>,
    ) -> RepairResult<Vec<StatusEvent>> {
        let limit_clause = if limit.is_some() { "LIMIT $limit" } else { "" };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM status_event \
             WHERE round_id = $round_id \
             ORDER BY created_at DESC {limit_clause}"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("round_id", round_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
        let events = rows
            .into_iter()
            .map(EventRow::try_into_event)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(events)
    }

    async fn rounds_for_case(
        &self,
        case_id: Uuid,
        limit: Option<u64>,
    ) -> RepairResult<Vec<ServiceRound>> {
        let limit_clause = if limit.is_some() { "LIMIT $limit" } else { "" };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM service_round \
             WHERE case_id = $case_id \
             ORDER BY started_at DESC, round_no DESC {limit_clause}"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("case_id", case_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoundRow> = result.take(0).map_err(DbError::from)?;
        let rounds = rows
            .into_iter()
            .map(RoundRow::try_into_round)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(rounds)
    }
}

impl<C: Connection> ServiceRoundRepository for SurrealServiceRoundRepository<C> {
    async fn create(&self, input: CreateRound) -> RepairResult<ServiceRound> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('service_round', $id) SET \
                 case_id = $case_id, round_no = $round_no, issue = $issue, \
                 status = 'PENDING', started_at = $started_at, \
                 updated_at = $started_at",
            )
            .bind(("id", id.to_string()))
            .bind(("case_id", input.case_id.to_string()))
            .bind(("round_no", input.round_no))
            .bind(("issue", input.issue))
            .bind(("started_at", input.started_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        select_round(&self.db, id).await
    }

    async fn get_by_id(&self, id: Uuid) -> RepairResult<ServiceRound> {
        select_round(&self.db, id).await
    }

    async fn list_for_case(&self, case_id: Uuid) -> RepairResult<Vec<ServiceRound>> {
        self.rounds_for_case(case_id, None).await
    }

    async fn latest_for_case(&self, case_id: Uuid) -> RepairResult<Option<ServiceRound>> {
        Ok(self
            .rounds_for_case(case_id, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn update_details(
        &self,
        id: Uuid,
        input: UpdateRound,
        at: DateTime<Utc>,
    ) -> RepairResult<ServiceRound> {
        let mut sets = Vec::new();
        if input.diagnosis.is_some() {
            sets.push("diagnosis = $diagnosis");
        }
        if input.resolution.is_some() {
            sets.push("resolution = $resolution");
        }
        if input.cost.is_some() {
            sets.push("cost = $cost");
        }
        if input.warranty_days.is_some() {
            sets.push("warranty_days = $warranty_days");
        }
        sets.push("updated_at = $at");

        let query = format!(
            "UPDATE type::record('service_round', $id) SET {}; {SELECT_ROUND};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("at", at));
        if let Some(diagnosis) = input.diagnosis {
            builder = builder.bind(("diagnosis", diagnosis));
        }
        if let Some(resolution) = input.resolution {
            builder = builder.bind(("resolution", resolution));
        }
        if let Some(cost) = input.cost {
            // Decimal is stored as its exact string form.
            builder = builder.bind(("cost", cost.map(|c| c.to_string())));
        }
        if let Some(warranty_days) = input.warranty_days {
            builder = builder.bind(("warranty_days", warranty_days));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<RoundRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("service_round", id))?;

        Ok(row.try_into_round()?)
    }

    async fn transition_status(
        &self,
        input: TransitionStatus,
    ) -> RepairResult<(StatusEvent, ServiceRound)> {
        // One guard statement, first, so its error is the one `check` reports.
        let mut query = String::from(
            "BEGIN TRANSACTION; \
             IF type::record('service_round', $round_id).status = NONE { \
                 THROW 'missing record: service_round' \
             }",
        );
        if input.expected_from.is_some() {
            query.push_str(
                " ELSE IF type::record('service_round', $round_id).status != $expected_from { \
                     THROW 'status conflict: round left the expected status' \
                 }",
            );
        }
        query.push_str("; ");
        query.push_str(
            "CREATE type::record('status_event', $event_id) SET \
             round_id = $round_id, \
             from_status = type::record('service_round', $round_id).status, \
             to_status = $to_status, notes = $notes, location = $location, \
             operator_id = $operator_id, created_at = $at; ",
        );
        let completed = if input.to_status.completes_round() {
            "completed_at = completed_at ?? $at, "
        } else {
            ""
        };
        query.push_str(&format!(
            "UPDATE type::record('service_round', $round_id) SET \
             status = $to_status, {completed}updated_at = $at; \
             COMMIT TRANSACTION;"
        ));

        debug!(
            round_id = %input.round_id,
            to_status = %input.to_status,
            "Transitioning round status"
        );

        self.db
            .query(&query)
            .bind(("round_id", input.round_id.to_string()))
            .bind(("event_id", input.event_id.to_string()))
            .bind((
                "expected_from",
                input.expected_from.map(|s| s.as_str().to_string()),
            ))
            .bind(("to_status", input.to_status.as_str().to_string()))
            .bind(("notes", input.notes))
            .bind(("location", input.location))
            .bind(("operator_id", input.operator_id.to_string()))
            .bind(("at", input.at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| {
                if e.to_string().contains(MISSING_ROUND) {
                    DbError::not_found("service_round", input.round_id)
                } else {
                    DbError::from_statement(e)
                }
            })?;

        let event = self.select_event(input.event_id).await?;
        let round = select_round(&self.db, input.round_id).await?;
        Ok((event, round))
    }

    async fn list_events(&self, round_id: Uuid) -> RepairResult<Vec<StatusEvent>> {
        self.events_for_round(round_id, None).await
    }

    async fn latest_event(&self, round_id: Uuid) -> RepairResult<Option<StatusEvent>> {
        Ok(self
            .events_for_round(round_id, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn list_snapshots(&self, created: DateRange) -> RepairResult<Vec<RoundSnapshot>> {
        let mut conditions = Vec::new();
        push_range(
            &mut conditions,
            "type::record('service_case', case_id).created_at",
            &created,
        );
        let query = format!(
            "SELECT case_id, round_no, status, started_at, completed_at \
             FROM service_round {} \
             ORDER BY started_at DESC, round_no DESC",
            where_clause(&conditions)
        );

        let mut builder = self.db.query(&query);
        for bind in range_binds(&created) {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<SnapshotRow> = result.take(0).map_err(DbError::from)?;
        let snapshots = rows
            .into_iter()
            .map(|row| {
                Ok(RoundSnapshot {
                    case_id: parse_uuid("service_case", &row.case_id)?,
                    round_no: row.round_no,
                    status: parse_enum(&row.status)?,
                    started_at: row.started_at,
                    completed_at: row.completed_at,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(snapshots)
    }

    async fn count_events_by_operator(
        &self,
        range: DateRange,
    ) -> RepairResult<Vec<OperatorActivity>> {
        let mut conditions = Vec::new();
        push_range(&mut conditions, "created_at", &range);
        let query = format!(
            "SELECT operator_id, count() AS total FROM status_event {} \
             GROUP BY operator_id",
            where_clause(&conditions)
        );

        let mut builder = self.db.query(&query);
        for bind in range_binds(&range) {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<OperatorRow> = result.take(0).map_err(DbError::from)?;
        let activity = rows
            .into_iter()
            .map(|row| {
                Ok(OperatorActivity {
                    operator_id: parse_uuid("operator", &row.operator_id)?,
                    events: row.total,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(activity)
    }
}
