//! SurrealDB implementation of [`ShipmentRepository`].

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::shipment::{
    CreateShipment, Shipment, ShipmentFilter, ShipmentStatus, UpdateShipment,
};
use repairdesk_core::repository::{PaginatedResult, Pagination, ShipmentRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, first_total, where_clause};
use crate::error::{DbError, parse_enum, parse_uuid};

const SELECT_SHIPMENT: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('shipment', $id)";

#[derive(Debug, SurrealValue)]
struct ShipmentRow {
    record_id: String,
    round_id: String,
    direction: String,
    carrier: Option<String>,
    tracking_number: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    notes: Option<String>,
    status: String,
    current_location: Option<String>,
    estimated_arrival: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    actual_arrival: Option<DateTime<Utc>>,
    operator_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShipmentRow {
    fn try_into_shipment(self) -> Result<Shipment, DbError> {
        Ok(Shipment {
            id: parse_uuid("shipment", &self.record_id)?,
            round_id: parse_uuid("service_round", &self.round_id)?,
            direction: parse_enum(&self.direction)?,
            carrier: self.carrier,
            tracking_number: self.tracking_number,
            origin: self.origin,
            destination: self.destination,
            notes: self.notes,
            status: parse_enum(&self.status)?,
            current_location: self.current_location,
            estimated_arrival: self.estimated_arrival,
            shipped_at: self.shipped_at,
            actual_arrival: self.actual_arrival,
            operator_id: parse_uuid("operator", &self.operator_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealShipmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealShipmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: Uuid) -> RepairResult<Shipment> {
        let mut result = self
            .db
            .query(SELECT_SHIPMENT)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShipmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("shipment", id))?;

        Ok(row.try_into_shipment()?)
    }

    async fn shipments_for_round(
        &self,
        round_id: Uuid,
        limit: Option<u64>,
    ) -> RepairResult<Vec<Shipment>> {
        let limit_clause = if limit.is_some() { "LIMIT $limit" } else { "" };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM shipment \
             WHERE round_id = $round_id ORDER BY created_at DESC {limit_clause}"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("round_id", round_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShipmentRow> = result.take(0).map_err(DbError::from)?;
        let shipments = rows
            .into_iter()
            .map(ShipmentRow::try_into_shipment)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(shipments)
    }
}

impl<C: Connection> ShipmentRepository for SurrealShipmentRepository<C> {
    async fn create(&self, input: CreateShipment) -> RepairResult<Shipment> {
        let id = Uuid::new_v4();
        let carrier = input.carrier;

        self.db
            .query(
                "CREATE type::record('shipment', $id) SET \
                 round_id = $round_id, direction = $direction, \
                 carrier = $carrier, tracking_number = $tracking_number, \
                 origin = $origin, destination = $destination, notes = $notes, \
                 status = $status, estimated_arrival = $estimated_arrival, \
                 operator_id = $operator_id, created_at = $at, updated_at = $at",
            )
            .bind(("id", id.to_string()))
            .bind(("round_id", input.round_id.to_string()))
            .bind(("direction", input.direction.as_str().to_string()))
            .bind(("carrier", carrier.carrier))
            .bind(("tracking_number", carrier.tracking_number))
            .bind(("origin", carrier.origin))
            .bind(("destination", carrier.destination))
            .bind(("notes", carrier.notes))
            .bind(("status", ShipmentStatus::Pending.as_str().to_string()))
            .bind(("estimated_arrival", carrier.estimated_arrival))
            .bind(("operator_id", input.operator_id.to_string()))
            .bind(("at", input.created_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.fetch(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> RepairResult<Shipment> {
        self.fetch(id).await
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateShipment,
        at: DateTime<Utc>,
    ) -> RepairResult<Shipment> {
        let mut sets = Vec::new();
        if let Some(status) = input.status {
            sets.push("status = $status");
            if status.stamps_shipped() {
                sets.push("shipped_at = shipped_at ?? $at");
            }
        }
        let stamps_arrival = input.status.is_some_and(|s| s.stamps_arrival());
        if stamps_arrival || input.actual_arrival.is_some() {
            sets.push("actual_arrival = actual_arrival ?? $arrival");
        }
        if input.current_location.is_some() {
            sets.push("current_location = $current_location");
        }
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }
        sets.push("updated_at = $at");

        let query = format!(
            "UPDATE type::record('shipment', $id) SET {}; {SELECT_SHIPMENT};",
            sets.join(", ")
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .bind(("arrival", input.actual_arrival.unwrap_or(at)))
            .bind(("status", input.status.map(|s| s.as_str().to_string())))
            .bind(("current_location", input.current_location))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<ShipmentRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("shipment", id))?;

        Ok(row.try_into_shipment()?)
    }

    async fn list(
        &self,
        filter: ShipmentFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Shipment>> {
        let mut conditions = Vec::new();
        if filter.direction.is_some() {
            conditions.push("direction = $direction".to_string());
        }
        if filter.status.is_some() {
            conditions.push("status = $status".to_string());
        }
        let clause = where_clause(&conditions);
        let query = format!(
            "SELECT count() AS total FROM shipment {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM shipment {clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("direction", filter.direction.map(|d| d.as_str().to_string())))
            .bind(("status", filter.status.map(|s| s.as_str().to_string())))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<ShipmentRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(ShipmentRow::try_into_shipment)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: first_total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_for_round(&self, round_id: Uuid) -> RepairResult<Vec<Shipment>> {
        self.shipments_for_round(round_id, None).await
    }

    async fn latest_for_round(&self, round_id: Uuid) -> RepairResult<Option<Shipment>> {
        Ok(self
            .shipments_for_round(round_id, Some(1))
            .await?
            .into_iter()
            .next())
    }
}
