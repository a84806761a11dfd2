//! Fine-grained capabilities grantable to staff identities.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    CaseReadAll,
    CaseReadAssigned,
    CaseWrite,
    DeviceRead,
    DeviceWrite,
    CustomerReadAll,
    CustomerWrite,
    ShipmentRead,
    ShipmentWrite,
    AuditRead,
}

impl Capability {
    pub const ALL: [Capability; 10] = [
        Capability::CaseReadAll,
        Capability::CaseReadAssigned,
        Capability::CaseWrite,
        Capability::DeviceRead,
        Capability::DeviceWrite,
        Capability::CustomerReadAll,
        Capability::CustomerWrite,
        Capability::ShipmentRead,
        Capability::ShipmentWrite,
        Capability::AuditRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseReadAll => "CASE_READ_ALL",
            Self::CaseReadAssigned => "CASE_READ_ASSIGNED",
            Self::CaseWrite => "CASE_WRITE",
            Self::DeviceRead => "DEVICE_READ",
            Self::DeviceWrite => "DEVICE_WRITE",
            Self::CustomerReadAll => "CUSTOMER_READ_ALL",
            Self::CustomerWrite => "CUSTOMER_WRITE",
            Self::ShipmentRead => "SHIPMENT_READ",
            Self::ShipmentWrite => "SHIPMENT_WRITE",
            Self::AuditRead => "AUDIT_READ",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("capability", s))
    }
}

/// A capability held by a staff identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub staff_id: Uuid,
    pub capability: Capability,
    /// Identity that performed the grant.
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_round_trips_for_every_capability() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn unknown_capability_is_rejected() {
        let err = "CASE_DELETE".parse::<Capability>().unwrap_err();
        assert_eq!(err.kind, "capability");
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&Capability::ShipmentWrite).unwrap();
        assert_eq!(json, "\"SHIPMENT_WRITE\"");
    }
}
