//! SurrealDB implementation of [`CustomerRepository`].
//!
//! Customer profiles are created together with their identity (see the
//! identity repository); this repository reads and edits them.

use chrono::{DateTime, Utc};
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::customer::{Customer, UpdateCustomer};
use repairdesk_core::repository::{CustomerRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, first_total};
use crate::error::{DbError, parse_uuid};

const SELECT_CUSTOMER: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('customer', $id)";

const SEARCH_CONDITION: &str = "WHERE string::lowercase(name) CONTAINS $search \
     OR string::lowercase(phone ?? '') CONTAINS $search \
     OR string::lowercase(email ?? '') CONTAINS $search";

#[derive(Debug, SurrealValue)]
struct CustomerRow {
    record_id: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    identity_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CustomerRow {
    fn try_into_customer(self) -> Result<Customer, DbError> {
        Ok(Customer {
            id: parse_uuid("customer", &self.record_id)?,
            name: self.name,
            phone: self.phone,
            email: self.email,
            address: self.address,
            identity_id: self
                .identity_id
                .as_deref()
                .map(|id| parse_uuid("identity", id))
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealCustomerRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCustomerRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CustomerRepository for SurrealCustomerRepository<C> {
    async fn get_by_id(&self, id: Uuid) -> RepairResult<Customer> {
        let mut result = self
            .db
            .query(SELECT_CUSTOMER)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CustomerRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("customer", id))?;

        Ok(row.try_into_customer()?)
    }

    async fn update(&self, id: Uuid, input: UpdateCustomer) -> RepairResult<Customer> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('customer', $id) SET {}; {SELECT_CUSTOMER};",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(address) = input.address {
            builder = builder.bind(("address", address));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        let rows: Vec<CustomerRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("customer", id))?;

        Ok(row.try_into_customer()?)
    }

    async fn list(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Customer>> {
        let clause = if search.is_some() { SEARCH_CONDITION } else { "" };
        let query = format!(
            "SELECT count() AS total FROM customer {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM customer {clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("search", search.map(|s| s.to_lowercase())))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<CustomerRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(CustomerRow::try_into_customer)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: first_total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count(&self) -> RepairResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM customer GROUP ALL")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_total(rows))
    }
}
