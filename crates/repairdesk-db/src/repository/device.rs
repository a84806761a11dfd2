//! SurrealDB implementation of [`DeviceRepository`].

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::device::{CreateDevice, Device, DeviceFilter, UpdateDevice};
use repairdesk_core::repository::{DeviceRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, first_total, where_clause};
use crate::error::{DbError, parse_uuid};

const SELECT_DEVICE: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('device', $id)";

#[derive(Debug, SurrealValue)]
struct DeviceRow {
    record_id: String,
    customer_id: String,
    brand: String,
    model: String,
    imei: Option<String>,
    serial: Option<String>,
    color: Option<String>,
    storage: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeviceRow {
    fn try_into_device(self) -> Result<Device, DbError> {
        Ok(Device {
            id: parse_uuid("device", &self.record_id)?,
            customer_id: parse_uuid("customer", &self.customer_id)?,
            brand: self.brand,
            model: self.model,
            imei: self.imei,
            serial: self.serial,
            color: self.color,
            storage: self.storage,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn filter_conditions(filter: &DeviceFilter) -> Vec<String> {
    let mut conditions = Vec::new();
    if filter.customer_id.is_some() {
        conditions.push("customer_id = $customer_id".to_string());
    }
    if filter.search.is_some() {
        conditions.push(
            "(string::lowercase(brand) CONTAINS $search \
             OR string::lowercase(model) CONTAINS $search \
             OR string::lowercase(imei ?? '') CONTAINS $search \
             OR string::lowercase(color ?? '') CONTAINS $search \
             OR string::lowercase(type::record('customer', customer_id).name ?? '') \
             CONTAINS $search)"
                .to_string(),
        );
    }
    conditions
}

#[derive(Clone)]
pub struct SurrealDeviceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDeviceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: Uuid) -> RepairResult<Device> {
        let mut result = self
            .db
            .query(SELECT_DEVICE)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DeviceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("device", id))?;

        Ok(row.try_into_device()?)
    }
}

impl<C: Connection> DeviceRepository for SurrealDeviceRepository<C> {
    async fn create(&self, input: CreateDevice) -> RepairResult<Device> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('device', $id) SET \
                 customer_id = $customer_id, brand = $brand, model = $model, \
                 imei = $imei, serial = $serial, color = $color, \
                 storage = $storage, notes = $notes",
            )
            .bind(("id", id.to_string()))
            .bind(("customer_id", input.customer_id.to_string()))
            .bind(("brand", input.brand))
            .bind(("model", input.model))
            .bind(("imei", input.imei))
            .bind(("serial", input.serial))
            .bind(("color", input.color))
            .bind(("storage", input.storage))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        self.fetch(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> RepairResult<Device> {
        self.fetch(id).await
    }

    async fn update(&self, id: Uuid, input: UpdateDevice) -> RepairResult<Device> {
        let mut sets = Vec::new();
        if input.brand.is_some() {
            sets.push("brand = $brand");
        }
        if input.model.is_some() {
            sets.push("model = $model");
        }
        if input.imei.is_some() {
            sets.push("imei = $imei");
        }
        if input.serial.is_some() {
            sets.push("serial = $serial");
        }
        if input.color.is_some() {
            sets.push("color = $color");
        }
        if input.storage.is_some() {
            sets.push("storage = $storage");
        }
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('device', $id) SET {}; {SELECT_DEVICE};",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(brand) = input.brand {
            builder = builder.bind(("brand", brand));
        }
        if let Some(model) = input.model {
            builder = builder.bind(("model", model));
        }
        if let Some(imei) = input.imei {
            builder = builder.bind(("imei", imei));
        }
        if let Some(serial) = input.serial {
            builder = builder.bind(("serial", serial));
        }
        if let Some(color) = input.color {
            builder = builder.bind(("color", color));
        }
        if let Some(storage) = input.storage {
            builder = builder.bind(("storage", storage));
        }
        if let Some(notes) = input.notes {
            builder = builder.bind(("notes", notes));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<DeviceRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("device", id))?;

        Ok(row.try_into_device()?)
    }

    async fn list(
        &self,
        filter: DeviceFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Device>> {
        let clause = where_clause(&filter_conditions(&filter));
        let query = format!(
            "SELECT count() AS total FROM device {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM device {clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("customer_id", filter.customer_id.map(|id| id.to_string())))
            .bind(("search", filter.search.map(|s| s.to_lowercase())))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<DeviceRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(DeviceRow::try_into_device)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: first_total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> RepairResult<Vec<Device>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM device \
                 WHERE customer_id = $customer_id ORDER BY created_at DESC",
            )
            .bind(("customer_id", customer_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DeviceRow> = result.take(0).map_err(DbError::from)?;
        let devices = rows
            .into_iter()
            .map(DeviceRow::try_into_device)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(devices)
    }
}
