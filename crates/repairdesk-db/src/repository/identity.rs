//! SurrealDB implementation of [`IdentityRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1) and a random salt per
//! hash. Verification belongs to the session provider.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::identity::{
    CreateIdentity, Identity, IdentityFilter, IdentityStatus, Role, UpdateIdentity,
};
use repairdesk_core::repository::{IdentityRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, first_total, where_clause};
use crate::error::{DbError, parse_enum, parse_uuid};

const SELECT_IDENTITY: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('identity', $id)";

#[derive(Debug, SurrealValue)]
struct IdentityRow {
    record_id: String,
    username: String,
    email: Option<String>,
    phone: Option<String>,
    role: String,
    status: String,
    password_hash: String,
    customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn try_into_identity(self) -> Result<Identity, DbError> {
        Ok(Identity {
            id: parse_uuid("identity", &self.record_id)?,
            username: self.username,
            email: self.email,
            phone: self.phone,
            role: parse_enum(&self.role)?,
            status: parse_enum(&self.status)?,
            password_hash: self.password_hash,
            customer_id: self
                .customer_id
                .as_deref()
                .map(|id| parse_uuid("customer", id))
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn hash_password(password: &str) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hashing(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Hashing(e.to_string()))?;

    Ok(hash.to_string())
}

/// Unique-index violations on `username` surface as `AlreadyExists`.
fn username_taken(err: DbError) -> RepairError {
    match err {
        DbError::Conflict(_) => RepairError::AlreadyExists {
            entity: "identity".into(),
        },
        other => other.into(),
    }
}

fn filter_conditions(filter: &IdentityFilter) -> Vec<String> {
    let mut conditions = Vec::new();
    if filter.role.is_some() {
        conditions.push("role = $role".to_string());
    }
    if filter.status.is_some() {
        conditions.push("status = $status".to_string());
    }
    conditions
}

#[derive(Clone)]
pub struct SurrealIdentityRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIdentityRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> IdentityRepository for SurrealIdentityRepository<C> {
    async fn create(&self, input: CreateIdentity) -> RepairResult<Identity> {
        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password)?;

        let customer_id = (input.role == Role::Customer).then(Uuid::new_v4);
        let mut query = String::from(
            "BEGIN TRANSACTION; \
             CREATE type::record('identity', $id) SET \
             username = $username, email = $email, phone = $phone, \
             role = $role, status = 'ACTIVE', \
             password_hash = $password_hash, customer_id = $customer_id; ",
        );
        if customer_id.is_some() {
            query.push_str(
                "CREATE type::record('customer', $customer_id) SET \
                 name = $customer_name, phone = $phone, email = $email, \
                 address = $customer_address, identity_id = $id; ",
            );
        }
        query.push_str("COMMIT TRANSACTION;");

        let customer_name = input
            .customer_name
            .unwrap_or_else(|| input.username.clone());

        self.db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("phone", input.phone))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("password_hash", password_hash))
            .bind(("customer_id", customer_id.map(|c| c.to_string())))
            .bind(("customer_name", customer_name))
            .bind(("customer_address", input.customer_address))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| username_taken(DbError::from_statement(e)))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> RepairResult<Identity> {
        let mut result = self
            .db
            .query(SELECT_IDENTITY)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("identity", id))?;

        Ok(row.try_into_identity()?)
    }

    async fn get_by_username(&self, username: &str) -> RepairResult<Identity> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM identity \
                 WHERE username = $username",
            )
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("identity", format!("username={username}")))?;

        Ok(row.try_into_identity()?)
    }

    async fn update(&self, id: Uuid, input: UpdateIdentity) -> RepairResult<Identity> {
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        let mut sets = Vec::new();
        if input.username.is_some() {
            sets.push("username = $username");
        }
        if password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('identity', $id) SET {}; {SELECT_IDENTITY};",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(username) = input.username {
            builder = builder.bind(("username", username));
        }
        if let Some(password_hash) = password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| username_taken(DbError::from_statement(e)))?;

        let rows: Vec<IdentityRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("identity", id))?;

        Ok(row.try_into_identity()?)
    }

    async fn disable(&self, id: Uuid) -> RepairResult<Identity> {
        self.update(
            id,
            UpdateIdentity {
                status: Some(IdentityStatus::Disabled),
                ..Default::default()
            },
        )
        .await
    }

    async fn list(
        &self,
        filter: IdentityFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Identity>> {
        let clause = where_clause(&filter_conditions(&filter));
        let role = filter.role.map(|r| r.as_str().to_string());
        let status = filter.status.map(|s| s.as_str().to_string());

        let query = format!(
            "SELECT count() AS total FROM identity {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM identity {clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("role", role))
            .bind(("status", status))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<IdentityRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(IdentityRow::try_into_identity)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: first_total(count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count(&self, filter: IdentityFilter) -> RepairResult<u64> {
        let clause = where_clause(&filter_conditions(&filter));
        let query = format!("SELECT count() AS total FROM identity {clause} GROUP ALL");
        let mut result = self
            .db
            .query(&query)
            .bind(("role", filter.role.map(|r| r.as_str().to_string())))
            .bind(("status", filter.status.map(|s| s.as_str().to_string())))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_total(rows))
    }

    async fn list_all(&self, filter: IdentityFilter) -> RepairResult<Vec<Identity>> {
        let clause = where_clause(&filter_conditions(&filter));
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM identity {clause} \
             ORDER BY username ASC"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("role", filter.role.map(|r| r.as_str().to_string())))
            .bind(("status", filter.status.map(|s| s.as_str().to_string())))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        let identities = rows
            .into_iter()
            .map(IdentityRow::try_into_identity)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(identities)
    }
}
