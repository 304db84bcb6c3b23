//! Read-only statement classification.
//!
//! A statement is read-only when its query body is built solely from
//! `SELECT`, `VALUES` and `TABLE` blocks. Everything else is a write, including
//! statements whose write is hidden inside a read-looking wrapper:
//!
//! ```text
//! SELECT * INTO copy FROM people              -- creates a table
//! WITH d AS (DELETE FROM people RETURNING *)  -- data-modifying CTE
//!   SELECT * FROM d
//! SELECT * FROM people FOR UPDATE             -- takes row locks
//! ```

use sqlparser::ast::{Query, SetExpr, Statement};
use tracing::debug;

use crate::ast::screen;

/// Returns true iff `sql` parses and every statement in it is read-only.
///
/// Unparseable text is never read-only.
pub fn is_read_only(sql: &str) -> bool {
    match screen(sql) {
        Ok(statements) => {
            let read_only = statements.iter().all(is_read_only_statement);
            debug!(statements = statements.len(), read_only, "Classified statement");
            read_only
        }
        Err(e) => {
            debug!(error = %e, "Unparseable statement classified as not read-only");
            false
        }
    }
}

/// Read-only check for a single parsed statement.
pub fn is_read_only_statement(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => is_read_only_query(query),
        _ => false,
    }
}

fn is_read_only_query(query: &Query) -> bool {
    if !query.locks.is_empty() {
        return false;
    }
    let ctes_read_only = query
        .with
        .as_ref()
        .is_none_or(|with| with.cte_tables.iter().all(|cte| is_read_only_query(&cte.query)));
    ctes_read_only && is_read_only_body(&query.body)
}

fn is_read_only_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => is_read_only_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_only_body(left) && is_read_only_body(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
        _ => false,
    }
}
