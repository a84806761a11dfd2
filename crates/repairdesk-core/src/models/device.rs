//! Device domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    /// Owning customer. Never reassigned.
    pub customer_id: Uuid,
    pub brand: String,
    pub model: String,
    pub imei: Option<String>,
    pub serial: Option<String>,
    pub color: Option<String>,
    pub storage: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDevice {
    pub customer_id: Uuid,
    pub brand: String,
    pub model: String,
    pub imei: Option<String>,
    pub serial: Option<String>,
    pub color: Option<String>,
    pub storage: Option<String>,
    pub notes: Option<String>,
}

/// Ownership is deliberately absent: devices keep their customer.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateDevice {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub imei: Option<Option<String>>,
    pub serial: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub storage: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub customer_id: Option<Uuid>,
    /// Case-insensitive match on brand, model or IMEI.
    pub search: Option<String>,
}
