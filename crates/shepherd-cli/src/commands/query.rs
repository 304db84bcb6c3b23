//! Query command - run a read-only query as a user.

use anyhow::{Context, Result};
use shepherd_config::ShepherdConfig;
use shepherd_gateway::{Gateway, PgPool, ResultSet};
use shepherd_rbac::CallerContext;
use shepherd_types::{Principal, RoleId, UserId};

use crate::style::{print_query_table, print_warn};

pub fn run(config: &ShepherdConfig, sql: &str, user: i32, role: i32, format: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let rows = runtime.block_on(execute(config, sql, user, role))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows.to_json_rows())?),
        _ => {
            let cells: Vec<Vec<String>> = rows
                .rows
                .iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect();
            print_query_table(&rows.columns, &cells);
        }
    }

    if rows.truncated {
        print_warn(&format!(
            "Result truncated to {} rows (query.max_rows)",
            config.query.max_rows
        ));
    }
    Ok(())
}

async fn execute(config: &ShepherdConfig, sql: &str, user: i32, role: i32) -> Result<ResultSet> {
    let pool = PgPool::from_config(&config.database).context("Failed to create connection pool")?;
    let gateway = Gateway::from_config(pool, config);
    let caller = CallerContext::new(Principal::new(UserId::new(user), RoleId::new(role)));

    let rows = gateway.run_read_only(&caller, sql).await?;
    Ok(rows)
}
