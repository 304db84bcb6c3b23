//! Configuration management commands.

use std::path::Path;

use anyhow::{Context, Result};
use shepherd_config::{Paths, ShepherdConfig};

use crate::style::{print_hint, print_labeled, print_success};

/// Show the effective configuration.
pub fn show(project: &str, format: &str) -> Result<()> {
    let config = ShepherdConfig::load_from_dir(project).context("Failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&redacted(&config))?),
        "toml" => println!("{}", toml::to_string_pretty(&redacted(&config))?),
        _ => {
            println!("Shepherd Configuration");
            println!("======================\n");

            println!("Database:");
            match &config.database.url {
                Some(_) => print_labeled("URL", "(set)"),
                None => {
                    print_labeled("Host", &config.database.host);
                    print_labeled("Port", &config.database.port.to_string());
                    print_labeled("Name", &config.database.name);
                    print_labeled("User", &config.database.user);
                }
            }
            print_labeled("Max connections", &config.database.max_connections.to_string());
            println!();

            println!("Access:");
            let access = &config.access;
            print_labeled("Administrator role", &access.admin_role_id.to_string());
            print_labeled("Leader role", &access.leader_role_id.to_string());
            print_labeled("Collaborator role", &access.collaborator_role_id.to_string());
            print_labeled("Denied tables", &access.denied_tables.join(", "));
            print_labeled("Protected view", &access.protected_view);
            println!();

            println!("Query:");
            print_labeled("Timeout (ms)", &config.query.timeout_ms.to_string());
            print_labeled("Max rows", &config.query.max_rows.to_string());
            println!();

            println!("Sources:");
            let project_path = Path::new(project);
            print_labeled("Project", &Paths::project_config_file(project_path).display().to_string());
            print_labeled("Local", &Paths::local_config_file(project_path).display().to_string());
            if let Ok(user) = Paths::new().user_config_file() {
                print_labeled("User", &user.display().to_string());
            }
        }
    }

    Ok(())
}

/// Load and validate the configuration without connecting.
pub fn validate(project: &str) -> Result<()> {
    ShepherdConfig::load_from_dir(project).context("Configuration is invalid")?;
    print_success("Configuration is valid");
    print_hint("Environment variables use the SHEPHERD_ prefix, e.g. SHEPHERD_QUERY__MAX_ROWS=500");
    Ok(())
}

/// Copy of `config` with credentials masked.
fn redacted(config: &ShepherdConfig) -> ShepherdConfig {
    let mut shown = config.clone();
    if shown.database.password.is_some() {
        shown.database.password = Some("********".to_string());
    }
    if shown.database.url.is_some() {
        shown.database.url = Some("********".to_string());
    }
    shown
}
