//! Tables command - list every table a statement references.

use anyhow::{Result, bail};
use shepherd_config::ShepherdConfig;
use shepherd_query::referenced_tables;

use crate::style::print_query_table;

pub fn run(config: &ShepherdConfig, sql: &str) -> Result<()> {
    let Some(tables) = referenced_tables(sql) else {
        bail!("Statement could not be parsed; every path would reject it");
    };

    let policy = config.access.table_policy();
    let rows: Vec<Vec<String>> = tables
        .into_iter()
        .map(|table| {
            let access = if policy.is_denied(&table) { "private" } else { "public" };
            vec![table, access.to_string()]
        })
        .collect();
    print_query_table(&["table".to_string(), "access".to_string()], &rows);
    Ok(())
}
