//! Status event domain model (append-only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::round::RoundStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: Uuid,
    pub round_id: Uuid,
    /// `None` only for an event recorded before the round had a status.
    pub from_status: Option<RoundStatus>,
    pub to_status: RoundStatus,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub operator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Number of status events authored by one operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorActivity {
    pub operator_id: Uuid,
    pub events: u64,
}
