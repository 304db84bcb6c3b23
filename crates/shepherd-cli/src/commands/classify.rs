//! Classify command - how the gateway would treat a statement.

use anyhow::Result;
use shepherd_config::ShepherdConfig;
use shepherd_query::{is_read_only, referenced_tables, screen};
use sqlparser::ast::Statement;

use crate::style::{print_hint, print_info_table};

pub fn run(config: &ShepherdConfig, sql: &str) -> Result<()> {
    let policy = config.access.table_policy();
    let read_only = is_read_only(sql);

    let (tables, private) = match (referenced_tables(sql), policy.denied_tables(sql)) {
        (Some(tables), Some(private)) => (join(tables), join(private)),
        _ => ("(unparseable)".to_string(), "(unparseable)".to_string()),
    };
    let touches_private = policy.touches_denied_table(sql);
    let statements = screen(sql).ok();
    let single = statements.as_ref().is_some_and(|s| s.len() == 1);
    // Non-query statements contribute every word token to the table set.
    let tables_label = if statements
        .as_ref()
        .is_some_and(|s| s.iter().all(|s| matches!(s, Statement::Query(_))))
    {
        "Tables"
    } else {
        "Tables (over-approximated)"
    };

    let read_path = if read_only && single && !touches_private {
        "accepted"
    } else {
        "rejected"
    };
    let guarded_path = if touches_private { "rejected" } else { "accepted" };

    print_info_table(&[
        ("Read-only", if read_only { "yes" } else { "no" }),
        (tables_label, tables.as_str()),
        ("Private tables", private.as_str()),
        ("Read-only path", read_path),
        ("Guarded path", guarded_path),
    ]);

    if !read_only {
        print_hint("Only SELECT statements run on the read-only path.");
    } else if !single {
        print_hint("The read-only path runs exactly one statement per call.");
    }
    Ok(())
}

fn join(tables: impl IntoIterator<Item = String>) -> String {
    let joined = tables.into_iter().collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}
