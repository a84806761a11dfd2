//! Error types for the RepairDesk system.

use serde::Serialize;
use thiserror::Error;

use crate::models::capability::Capability;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied: {reason}")]
    Forbidden {
        reason: String,
        /// Capabilities any one of which would have admitted the request.
        required: Vec<Capability>,
    },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RepairResult<T> = Result<T, RepairError>;

impl RepairError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Coarse failure class used by callers to pick a transport status.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } | Self::Conflict { .. } | Self::InvalidState { .. } => {
                ErrorKind::Conflict
            }
            Self::Validation { .. } | Self::InvalidTarget { .. } => ErrorKind::ValidationFailed,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    ValidationFailed,
    Internal,
}

/// Structured failure handed to the request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&RepairError> for Failure {
    fn from(err: &RepairError) -> Self {
        let details = match err {
            RepairError::Forbidden { required, .. } if !required.is_empty() => Some(
                serde_json::json!({ "required": required.iter().map(|c| c.as_str()).collect::<Vec<_>>() }),
            ),
            RepairError::Validation { field, .. } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };
        // Storage internals never leak to callers.
        let message = match err {
            RepairError::Database(_) | RepairError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };
        Self {
            kind: err.kind(),
            message,
            details,
        }
    }
}
