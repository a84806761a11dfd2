//! Service round domain model and status lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// Round status. The nominal path runs top to bottom; `Returned` and
/// `Cancelled` branch off from most states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Pending,
    Received,
    Diagnosing,
    AwaitingParts,
    Repairing,
    Qa,
    ReadyToShip,
    Shipping,
    Delivered,
    Closed,
    Returned,
    Cancelled,
}

impl RoundStatus {
    pub const ALL: [RoundStatus; 12] = [
        RoundStatus::Pending,
        RoundStatus::Received,
        RoundStatus::Diagnosing,
        RoundStatus::AwaitingParts,
        RoundStatus::Repairing,
        RoundStatus::Qa,
        RoundStatus::ReadyToShip,
        RoundStatus::Shipping,
        RoundStatus::Delivered,
        RoundStatus::Closed,
        RoundStatus::Returned,
        RoundStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Received => "RECEIVED",
            Self::Diagnosing => "DIAGNOSING",
            Self::AwaitingParts => "AWAITING_PARTS",
            Self::Repairing => "REPAIRING",
            Self::Qa => "QA",
            Self::ReadyToShip => "READY_TO_SHIP",
            Self::Shipping => "SHIPPING",
            Self::Delivered => "DELIVERED",
            Self::Closed => "CLOSED",
            Self::Returned => "RETURNED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Entering this status stamps the round's completion time.
    pub fn completes_round(&self) -> bool {
        matches!(self, Self::Delivered | Self::Closed)
    }

    /// A round in this status may be followed by a rework round.
    pub fn allows_rework(&self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Closed | Self::Returned | Self::Cancelled
        )
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("round status", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRound {
    pub id: Uuid,
    pub case_id: Uuid,
    /// 1-based, strictly increasing per case.
    pub round_no: u32,
    pub issue: String,
    pub diagnosis: Option<String>,
    pub resolution: Option<String>,
    pub cost: Option<Decimal>,
    pub warranty_days: Option<u32>,
    /// Always mirrors the `to_status` of the round's latest status event.
    pub status: RoundStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRound {
    pub fn is_rework(&self) -> bool {
        self.round_no > 1
    }
}

/// Input for opening a follow-up round on an existing case.
#[derive(Debug, Clone)]
pub struct CreateRound {
    pub case_id: Uuid,
    pub round_no: u32,
    pub issue: String,
    pub started_at: DateTime<Utc>,
}

/// Partial update of round details. Has no status side effects.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateRound {
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub diagnosis: Option<Option<String>>,
    pub resolution: Option<Option<String>>,
    pub cost: Option<Option<Decimal>>,
    pub warranty_days: Option<Option<u32>>,
}

/// Input for a status transition on a round.
#[derive(Debug, Clone)]
pub struct TransitionStatus {
    pub round_id: Uuid,
    /// Pre-generated id of the status event to append.
    pub event_id: Uuid,
    pub to_status: RoundStatus,
    /// When set, the transition fails with a conflict unless the round is
    /// still in this status.
    pub expected_from: Option<RoundStatus>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub operator_id: Uuid,
    pub at: DateTime<Utc>,
}

/// Minimal round projection used by statistics.
#[derive(Debug, Clone)]
pub struct RoundSnapshot {
    pub case_id: Uuid,
    pub round_no: u32,
    pub status: RoundStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
