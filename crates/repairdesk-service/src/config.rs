//! Service configuration.

use std::fmt;

use chrono::Duration;
use repairdesk_core::error::{RepairError, RepairResult};
use serde::Deserialize;

use crate::policy::TransitionPolicy;

/// Configuration shared by every service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Which round status may follow which (default: unrestricted).
    pub transition_policy: TransitionPolicy,
    /// Staff entries returned by fleet statistics (default: 10).
    pub stats_top_staff: usize,
    /// Window of the "recent cases" activity figure, in days (default: 7).
    pub recent_window_days: i64,
    /// Attempts at allocating a case number before giving up (default: 5).
    pub case_number_attempts: u32,
    /// Administrator created at startup when no admin exists yet.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::default(),
            stats_top_staff: 10,
            recent_window_days: 7,
            case_number_attempts: 5,
            bootstrap_admin: None,
        }
    }
}

impl ServiceConfig {
    /// Reject values the services cannot work with.
    pub fn validate(&self) -> RepairResult<()> {
        self.recent_window()?;
        if self.case_number_attempts == 0 {
            return Err(RepairError::validation(
                "case_number_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// The recent-activity window as a duration.
    pub fn recent_window(&self) -> RepairResult<Duration> {
        if self.recent_window_days < 0 {
            return Err(RepairError::validation(
                "recent_window_days",
                "must not be negative",
            ));
        }
        Duration::try_days(self.recent_window_days)
            .ok_or_else(|| RepairError::validation("recent_window_days", "out of range"))
    }
}

#[derive(Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ServiceConfig =
            serde_json::from_value(serde_json::json!({ "stats_top_staff": 3 })).unwrap();
        assert_eq!(config.stats_top_staff, 3);
        assert_eq!(config.recent_window_days, 7);
        assert_eq!(config.case_number_attempts, 5);
        assert_eq!(config.transition_policy, TransitionPolicy::Unrestricted);
    }

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recent_window().unwrap(), Duration::days(7));
    }

    #[test]
    fn oversized_recent_window_is_rejected() {
        let config = ServiceConfig {
            recent_window_days: i64::MAX,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RepairError::Validation { ref field, .. } if field == "recent_window_days"));
    }

    #[test]
    fn zero_case_number_attempts_is_rejected() {
        let config = ServiceConfig {
            case_number_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bootstrap_password_is_not_printed() {
        let admin = BootstrapAdmin {
            username: "root".into(),
            password: "s3cret-value".into(),
        };
        assert!(!format!("{admin:?}").contains("s3cret-value"));
    }
}
