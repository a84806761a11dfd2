//! Audit log domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DateRange;

/// Kinds of mutating actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateUser,
    UpdateUser,
    DisableUser,
    AssignPermission,
    UpdateCustomer,
    CreateDevice,
    UpdateDevice,
    CreateCase,
    UpdateCase,
    CloseCase,
    OpenReworkRound,
    UpdateRound,
    UpdateStatus,
    CreateShipment,
    UpdateShipment,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateUser => "CREATE_USER",
            Self::UpdateUser => "UPDATE_USER",
            Self::DisableUser => "DISABLE_USER",
            Self::AssignPermission => "ASSIGN_PERMISSION",
            Self::UpdateCustomer => "UPDATE_CUSTOMER",
            Self::CreateDevice => "CREATE_DEVICE",
            Self::UpdateDevice => "UPDATE_DEVICE",
            Self::CreateCase => "CREATE_CASE",
            Self::UpdateCase => "UPDATE_CASE",
            Self::CloseCase => "CLOSE_CASE",
            Self::OpenReworkRound => "OPEN_REWORK_ROUND",
            Self::UpdateRound => "UPDATE_ROUND",
            Self::UpdateStatus => "UPDATE_STATUS",
            Self::CreateShipment => "CREATE_SHIPMENT",
            Self::UpdateShipment => "UPDATE_SHIPMENT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    /// Stored as the action's string form so older kinds keep loading.
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAuditLogEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub range: DateRange,
}
