//! Service case domain model and case-number composition.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DateRange;

/// Prefix of every human-readable case number.
pub const CASE_NUMBER_PREFIX: &str = "CS";

/// `YYYYMMDD` key of the UTC calendar day a case was opened on.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Compose a case number from its day and 1-based daily sequence,
/// e.g. `CS20240115001`.
pub fn compose_case_number(date: NaiveDate, sequence: u32) -> String {
    format!("{CASE_NUMBER_PREFIX}{}{sequence:03}", day_key(date))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCase {
    pub id: Uuid,
    pub device_id: Uuid,
    pub case_number: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Case-level closure, independent of round status.
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Input for opening a case together with its first round.
#[derive(Debug, Clone)]
pub struct CreateServiceCase {
    pub device_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Issue reported for round 1.
    pub issue: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateServiceCase {
    pub title: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Case-insensitive match on case number, title, or device
    /// brand/model/IMEI.
    pub search: Option<String>,
    pub customer_id: Option<Uuid>,
    pub created: DateRange,
}

/// Rework markers derived from a case's rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReworkFlags {
    /// More than one round exists.
    pub is_rework: bool,
    /// Some round has a round number above 2.
    pub multiple_reworks: bool,
}

impl ReworkFlags {
    pub fn from_round_numbers(round_numbers: impl IntoIterator<Item = u32>) -> Self {
        let mut count = 0usize;
        let mut max = 0u32;
        for no in round_numbers {
            count += 1;
            max = max.max(no);
        }
        Self {
            is_rework: count > 1,
            multiple_reworks: max > 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn case_number_pads_sequence_to_three_digits() {
        assert_eq!(compose_case_number(jan_15(), 1), "CS20240115001");
        assert_eq!(compose_case_number(jan_15(), 42), "CS20240115042");
        assert_eq!(compose_case_number(jan_15(), 1000), "CS202401151000");
    }

    #[test]
    fn same_day_numbers_order_by_sequence() {
        let first = compose_case_number(jan_15(), 9);
        let second = compose_case_number(jan_15(), 10);
        assert!(first < second);
    }

    #[test]
    fn rework_flags_follow_round_count_and_max_number() {
        assert_eq!(
            ReworkFlags::from_round_numbers([1]),
            ReworkFlags {
                is_rework: false,
                multiple_reworks: false
            }
        );
        assert_eq!(
            ReworkFlags::from_round_numbers([1, 2]),
            ReworkFlags {
                is_rework: true,
                multiple_reworks: false
            }
        );
        assert_eq!(
            ReworkFlags::from_round_numbers([3, 2, 1]),
            ReworkFlags {
                is_rework: true,
                multiple_reworks: true
            }
        );
    }
}
