//! Shipment domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentDirection {
    /// Customer to repair center.
    Inbound,
    /// Repair center to customer.
    Outbound,
}

impl ShipmentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "INBOUND",
            Self::Outbound => "OUTBOUND",
        }
    }
}

impl FromStr for ShipmentDirection {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INBOUND" => Ok(Self::Inbound),
            "OUTBOUND" => Ok(Self::Outbound),
            other => Err(UnknownVariant::new("shipment direction", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Arrived,
    Signed,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InTransit => "IN_TRANSIT",
            Self::Arrived => "ARRIVED",
            Self::Signed => "SIGNED",
        }
    }

    /// Entering this status stamps `shipped_at` if unset.
    pub fn stamps_shipped(&self) -> bool {
        matches!(self, Self::InTransit)
    }

    /// Entering this status stamps `actual_arrival` if unset.
    pub fn stamps_arrival(&self) -> bool {
        matches!(self, Self::Arrived | Self::Signed)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "ARRIVED" => Ok(Self::Arrived),
            "SIGNED" => Ok(Self::Signed),
            other => Err(UnknownVariant::new("shipment status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub round_id: Uuid,
    pub direction: ShipmentDirection,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
    pub status: ShipmentStatus,
    pub current_location: Option<String>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub operator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Carrier details supplied when a shipment is registered.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CarrierInfo {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
    pub estimated_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateShipment {
    pub round_id: Uuid,
    pub direction: ShipmentDirection,
    pub carrier: CarrierInfo,
    pub operator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateShipment {
    pub status: Option<ShipmentStatus>,
    pub current_location: Option<String>,
    pub notes: Option<String>,
    /// Explicit arrival time; like the automatic stamp, only applied while
    /// no arrival is recorded.
    pub actual_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub direction: Option<ShipmentDirection>,
    pub status: Option<ShipmentStatus>,
}
