//! Domain models for RepairDesk.
//!
//! These are the core types shared across all crates. Enumerations are
//! persisted and serialized as SCREAMING_SNAKE_CASE strings.

pub mod audit;
pub mod capability;
pub mod customer;
pub mod device;
pub mod identity;
pub mod round;
pub mod service_case;
pub mod shipment;
pub mod status_event;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Returned when a stored or submitted string names no known variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Inclusive creation-time window used by list and statistics queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}
