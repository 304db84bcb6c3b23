//! Configuration loader with multi-source merging

use crate::{Paths, ShepherdConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "SHEPHERD".to_string(),
            include_user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "SHEPHERD")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/shepherd/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<ShepherdConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = ShepherdConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/shepherd/config.toml)
        if self.include_user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 3. Project config (shepherd.toml)
        builder = builder.add_source(
            config::File::from(Paths::project_config_file(&self.project_dir))
                .required(false)
                .format(config::FileFormat::Toml),
        );

        // 4. Local config (shepherd.local.toml, gitignored)
        builder = builder.add_source(
            config::File::from(Paths::local_config_file(&self.project_dir))
                .required(false)
                .format(config::FileFormat::Toml),
        );

        // 5. Environment variables (SHEPHERD_ACCESS__ADMIN_ROLE_ID=3)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("access.denied_tables"),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let shepherd_config: ShepherdConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        shepherd_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(shepherd_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .with_env_prefix("SHEPHERD_TEST_DEFAULTS")
            .without_user_config()
            .load()
            .expect("Failed to load config");

        assert_eq!(config, ShepherdConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[database]
host = "db.internal"
max_connections = 32

[access]
admin_role_id = 4
leader_role_id = 7
collaborator_role_id = 8
denied_tables = ["users", "payroll"]

[query]
timeout_ms = 2500
"#;
        fs::write(project_dir.join("shepherd.toml"), config_content)
            .expect("Failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("SHEPHERD_TEST_PROJECT")
            .without_user_config()
            .load()
            .expect("Failed to load config");

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.max_connections, 32);
        assert_eq!(config.access.admin_role_id, 4);
        assert_eq!(config.access.denied_tables, vec!["users", "payroll"]);
        assert_eq!(config.query.timeout_ms, 2500);
        assert_eq!(config.query.max_rows, 1000);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("shepherd.toml"),
            r#"
[database]
host = "db.internal"
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("shepherd.local.toml"),
            r#"
[database]
host = "localhost"
password = "hunter2"
"#,
        )
        .expect("Failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("SHEPHERD_TEST_LOCAL")
            .without_user_config()
            .load()
            .expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("shepherd.toml"),
            r#"
[access]
leader_role_id = 3
collaborator_role_id = 3
"#,
        )
        .expect("Failed to write project config");

        let result = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("SHEPHERD_TEST_INVALID")
            .without_user_config()
            .load();

        assert!(result.is_err());
    }

    // Environment variables are process-global, so they are not set here.
    // They override file values in actual usage:
    //
    // SHEPHERD_DATABASE__URL=postgres://shepherd@db/shepherd
    // SHEPHERD_ACCESS__DENIED_TABLES=audit_log,users,refresh_tokens
    // SHEPHERD_QUERY__MAX_ROWS=200
}
