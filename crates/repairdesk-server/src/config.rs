//! Server configuration loading.

use std::path::Path;

use repairdesk_db::DbConfig;
use repairdesk_service::ServiceConfig;
use serde::Deserialize;

use crate::error::ServerError;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_ENV: &str = "REPAIRDESK_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub service: ServiceConfig,
}

impl AppConfig {
    /// Read the file named by `REPAIRDESK_CONFIG`, or fall back to
    /// defaults when the variable is unset.
    pub fn load() -> Result<Self, ServerError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(raw)?;
        config.service.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use repairdesk_core::models::round::RoundStatus;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.db.namespace, "repairdesk");
        assert_eq!(config.service.stats_top_staff, 10);
        assert!(config.service.bootstrap_admin.is_none());
    }

    #[test]
    fn parses_sections_and_policy() {
        let config = AppConfig::from_toml(
            r#"
            [db]
            url = "db.internal:8000"

            [service]
            recent_window_days = 14

            [service.bootstrap_admin]
            username = "root"
            password = "change-me-now"

            [service.transition_policy]
            mode = "allow_list"

            [service.transition_policy.transitions]
            PENDING = ["RECEIVED", "CANCELLED"]
            "#,
        )
        .unwrap();

        assert_eq!(config.db.url, "db.internal:8000");
        assert_eq!(config.db.database, "main");
        assert_eq!(config.service.recent_window_days, 14);
        assert_eq!(
            config.service.bootstrap_admin.map(|a| a.username).as_deref(),
            Some("root")
        );
        assert!(
            config
                .service
                .transition_policy
                .permits(RoundStatus::Pending, RoundStatus::Cancelled)
        );
        assert!(
            !config
                .service
                .transition_policy
                .permits(RoundStatus::Pending, RoundStatus::Closed)
        );
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(matches!(
            AppConfig::from_toml("[db"),
            Err(ServerError::ConfigParse(_))
        ));
    }

    #[test]
    fn out_of_range_window_fails_at_load() {
        let err = AppConfig::from_toml(
            r#"
            [service]
            recent_window_days = 9223372036854775807
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ServerError::Repair(_)), "got {err:?}");
    }
}
