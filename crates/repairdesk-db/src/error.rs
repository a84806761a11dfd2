//! Database-specific error types and conversions.

use repairdesk_core::error::RepairError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// A unique index rejected the write, or a concurrent transaction won.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classify a statement error returned by `Response::check`.
    pub(crate) fn from_statement(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("already contains") || lower.contains("conflict") {
            Self::Conflict(message)
        } else {
            Self::Query(message)
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for RepairError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => RepairError::NotFound { entity, id },
            DbError::Conflict(reason) => RepairError::Conflict { reason },
            other => RepairError::Database(other.to_string()),
        }
    }
}

/// Parse a UUID column stored as a string.
pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {column} UUID: {e}")))
}

/// Parse an enum column stored as its SCREAMING_SNAKE string form.
pub(crate) fn parse_enum<T>(value: &str) -> Result<T, DbError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| DbError::Decode(e.to_string()))
}
