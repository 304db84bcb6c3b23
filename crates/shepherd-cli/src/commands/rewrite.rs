//! Rewrite command - show the row-scoped SQL for a caller.

use anyhow::{Context, Result, bail};
use shepherd_config::ShepherdConfig;
use shepherd_query::{RowScope, is_read_only, rewrite};
use shepherd_types::{PersonId, UserId};

use crate::style::{SemanticStyle, print_labeled, print_warn};

pub fn run(config: &ShepherdConfig, sql: &str, user: i32, person: i32) -> Result<()> {
    let access = &config.access;
    if !is_read_only(sql) {
        bail!("Only read-only statements are rewritten");
    }

    let scope = RowScope::new(UserId::new(user), PersonId::new(person), access.roles().allowed())
        .with_tables(
            access.protected_view.as_str(),
            access.membership_table.as_str(),
            access.people_table.as_str(),
        );
    let rewritten = rewrite(sql, &scope).context("Statement cannot be scoped")?;

    if rewritten.was_scoped() {
        print_labeled("Scoped references", &rewritten.scoped.to_string());
    } else {
        print_warn(&format!("No reference to {}; statement is unchanged", access.protected_view));
    }
    println!("{}", rewritten.sql.code());
    Ok(())
}
