//! Shepherd CLI.
//!
//! Inspect how the gateway treats a statement, and run read-only queries as a
//! given user.
//!
//! # Quick Start
//!
//! ```bash
//! # Would this text be accepted on the read-only path?
//! shepherd classify "SELECT * FROM vw_people"
//!
//! # What does a non-administrator actually execute?
//! shepherd rewrite "SELECT id FROM vw_people" --user 7 --person 42
//!
//! # Run it against the configured database
//! shepherd query "SELECT id FROM vw_people" --user 7 --role 3
//! ```

mod commands;
mod style;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shepherd_config::ShepherdConfig;

/// Shepherd - a permission-aware SQL gateway.
#[derive(Parser)]
#[command(name = "shepherd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Project directory containing shepherd.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Classify a statement: read-only or not, and which tables it touches.
    Classify {
        /// SQL text.
        sql: String,
    },

    /// List the tables a statement references and whether each is private.
    Tables {
        /// SQL text.
        sql: String,
    },

    /// Show the row-scoped SQL a non-administrator would execute.
    Rewrite {
        /// SQL text.
        sql: String,

        /// Caller's user id.
        #[arg(short, long)]
        user: i32,

        /// Caller's linked person id.
        #[arg(long)]
        person: i32,
    },

    /// Run a read-only query as a user.
    Query {
        /// SQL text.
        sql: String,

        /// Caller's user id.
        #[arg(short, long)]
        user: i32,

        /// Caller's account role id.
        #[arg(short, long)]
        role: i32,

        /// Output format (table, json).
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check the configuration without connecting.
    Validate,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        style::set_no_color(true);
    }

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Classify { sql } => commands::classify::run(&load_config(&cli.project)?, &sql),
        Commands::Tables { sql } => commands::tables::run(&load_config(&cli.project)?, &sql),
        Commands::Rewrite { sql, user, person } => {
            commands::rewrite::run(&load_config(&cli.project)?, &sql, user, person)
        }
        Commands::Query {
            sql,
            user,
            role,
            format,
        } => commands::query::run(&load_config(&cli.project)?, &sql, user, role, &format),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(&cli.project, &format),
            ConfigCommands::Validate => commands::config::validate(&cli.project),
        },
    }
}

fn load_config(project: &str) -> Result<ShepherdConfig> {
    ShepherdConfig::load_from_dir(project)
        .with_context(|| format!("Failed to load configuration from {project}"))
}
