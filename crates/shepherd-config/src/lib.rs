//! Configuration management for Shepherd
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`SHEPHERD_*` prefix, `__` between sections)
//! 2. shepherd.local.toml (gitignored, local overrides and secrets)
//! 3. shepherd.toml (git-tracked, project config)
//! 4. ~/.config/shepherd/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Role ids, the deny-list and the protected view all come from here; none of
//! them are hard-coded in the gateway.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use shepherd_query::{DEFAULT_DENIED_TABLES, TablePolicy, is_identifier};
use shepherd_rbac::AccessRoles;
use shepherd_types::RoleId;
use std::path::Path;
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Shepherd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShepherdConfig {
    pub database: DatabaseConfig,
    pub access: AccessConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection string. Takes precedence over the discrete fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 5432,
            name: "shepherd".to_string(),
            user: "shepherd".to_string(),
            password: None,
            max_connections: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub admin_role_id: i32,
    pub leader_role_id: i32,
    pub collaborator_role_id: i32,
    pub denied_tables: Vec<String>,
    pub protected_view: String,
    pub membership_table: String,
    pub people_table: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_role_id: 1,
            leader_role_id: 1,
            collaborator_role_id: 2,
            denied_tables: DEFAULT_DENIED_TABLES.iter().map(ToString::to_string).collect(),
            protected_view: "vw_people".to_string(),
            membership_table: "people_ministries".to_string(),
            people_table: "people".to_string(),
        }
    }
}

impl AccessConfig {
    pub fn roles(&self) -> AccessRoles {
        AccessRoles::new(
            RoleId::new(self.admin_role_id),
            RoleId::new(self.leader_role_id),
            RoleId::new(self.collaborator_role_id),
        )
    }

    pub fn table_policy(&self) -> TablePolicy {
        TablePolicy::new(&self.denied_tables)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long the read-only path waits for a result.
    pub timeout_ms: u64,
    /// Rows returned by the read-only path before the result is truncated.
    pub max_rows: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_rows: 1000,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ShepherdConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Load a single TOML file, without any other source.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let access = &self.access;

        if access.leader_role_id == access.collaborator_role_id {
            return Err(ConfigError::ValidationError(format!(
                "leader_role_id and collaborator_role_id must differ (both are {})",
                access.leader_role_id
            )));
        }

        for (field, name) in [
            ("protected_view", &access.protected_view),
            ("membership_table", &access.membership_table),
            ("people_table", &access.people_table),
        ] {
            if !is_identifier(name) {
                return Err(ConfigError::ValidationError(format!(
                    "access.{field} '{name}' is not a plain SQL identifier"
                )));
            }
        }

        for table in &access.denied_tables {
            if !is_identifier(table.trim()) {
                return Err(ConfigError::ValidationError(format!(
                    "access.denied_tables entry '{table}' is not a plain SQL identifier"
                )));
            }
        }

        let view = access.protected_view.to_ascii_lowercase();
        if view == access.membership_table.to_ascii_lowercase()
            || view == access.people_table.to_ascii_lowercase()
        {
            return Err(ConfigError::ValidationError(
                "access.protected_view must differ from the membership and people tables".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.query.timeout_ms == 0 || self.query.max_rows == 0 {
            return Err(ConfigError::ValidationError(
                "query.timeout_ms and query.max_rows must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShepherdConfig::default();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.access.protected_view, "vw_people");
        assert_eq!(config.query.timeout(), Duration::from_secs(10));
        assert_eq!(config.query.max_rows, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_access_helpers() {
        let access = AccessConfig::default();
        let roles = access.roles();
        assert!(roles.is_admin(RoleId::new(1)));
        assert_eq!(roles.allowed(), [RoleId::new(1), RoleId::new(2)]);
        assert!(access.table_policy().is_denied("refresh_tokens"));
    }

    #[test]
    fn test_rejects_identical_ministry_roles() {
        let mut config = ShepherdConfig::default();
        config.access.collaborator_role_id = config.access.leader_role_id;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_non_identifier_view() {
        let mut config = ShepherdConfig::default();
        config.access.protected_view = "vw_people; DROP TABLE users".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_view_equal_to_people_table() {
        let mut config = ShepherdConfig::default();
        config.access.protected_view = "People".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = ShepherdConfig::default();
        config.query.max_rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[query]\nmax_rows = 50\n").expect("Failed to write config");

        let config = ShepherdConfig::from_toml_file(&path).expect("Failed to load config");
        assert_eq!(config.query.max_rows, 50);
        assert_eq!(config.query.timeout_ms, 10_000);

        std::fs::write(&path, "[query\n").expect("Failed to write config");
        assert!(matches!(
            ShepherdConfig::from_toml_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
        assert!(matches!(
            ShepherdConfig::from_toml_file(dir.path().join("missing.toml")),
            Err(ConfigError::ReadError { .. })
        ));
    }
}
