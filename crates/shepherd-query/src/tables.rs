//! Table reference extraction and the private-table guard.
//!
//! The working set of a statement is the union of:
//! - every relation the AST visitor reports (FROM items, joins, DML targets,
//!   subqueries and CTE bodies at any depth)
//! - every `TABLE name` query body
//! - for statements that are not queries, every word token of the text
//!
//! The last source over-approximates on purpose. DDL and utility statements
//! keep object names outside the relation positions the visitor reports, and a
//! false match only denies more.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use sqlparser::ast::{Query, SetExpr, Statement, Visit, Visitor, visit_relations};
use tracing::{debug, warn};

use crate::ast::{relation_key, screen, word_tokens};

/// Tables commonly kept away from caller-supplied SQL.
pub const DEFAULT_DENIED_TABLES: [&str; 4] = ["audit_log", "users", "refresh_tokens", "aux_user_roles"];

/// Deny-list of tables that caller-supplied SQL may never reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePolicy {
    denied: BTreeSet<String>,
}

impl Default for TablePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DENIED_TABLES)
    }
}

impl TablePolicy {
    pub fn new<I, S>(denied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denied: denied
                .into_iter()
                .map(|name| name.as_ref().trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn denied(&self) -> impl Iterator<Item = &str> {
        self.denied.iter().map(String::as_str)
    }

    pub fn is_denied(&self, table: &str) -> bool {
        self.denied.contains(&table.to_ascii_lowercase())
    }

    /// Returns true if `sql` references a denied table, or cannot be parsed.
    pub fn touches_denied_table(&self, sql: &str) -> bool {
        match self.denied_tables(sql) {
            Some(found) => !found.is_empty(),
            None => true,
        }
    }

    /// Denied tables referenced by `sql`.
    ///
    /// Returns `None` when the text cannot be parsed; callers must treat that as denied.
    pub fn denied_tables(&self, sql: &str) -> Option<BTreeSet<String>> {
        let tables = match referenced_tables(sql) {
            Some(tables) => tables,
            None => {
                warn!("Unparseable statement treated as touching a denied table");
                return None;
            }
        };

        let found: BTreeSet<String> = tables
            .into_iter()
            .filter(|table| self.denied.contains(table))
            .collect();
        if !found.is_empty() {
            warn!(tables = ?found, "Statement references denied tables");
        }
        Some(found)
    }
}

/// Every table name `sql` may touch, as comparison keys.
///
/// Returns `None` when the text cannot be parsed.
pub fn referenced_tables(sql: &str) -> Option<BTreeSet<String>> {
    let statements = screen(sql).ok()?;
    let mut tables = BTreeSet::new();

    for statement in &statements {
        collect_statement_tables(statement, &mut tables);
    }

    if statements.iter().any(|s| !matches!(s, Statement::Query(_))) {
        tables.extend(word_tokens(sql)?);
    }

    debug!(count = tables.len(), "Extracted table references");
    Some(tables)
}

fn collect_statement_tables(statement: &Statement, tables: &mut BTreeSet<String>) {
    let _ = visit_relations(statement, |name| {
        if let Some(key) = relation_key(name) {
            tables.insert(key);
        }
        ControlFlow::<()>::Continue(())
    });

    let mut bodies = TableBodies { tables };
    let _ = statement.visit(&mut bodies);
}

/// Collects `TABLE name` query bodies, which are not reported as relations.
struct TableBodies<'a> {
    tables: &'a mut BTreeSet<String>,
}

impl Visitor for TableBodies<'_> {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        collect_table_bodies(&query.body, self.tables);
        ControlFlow::Continue(())
    }
}

fn collect_table_bodies(body: &SetExpr, tables: &mut BTreeSet<String>) {
    match body {
        SetExpr::Table(table) => {
            if let Some(name) = &table.table_name {
                tables.insert(name.to_ascii_lowercase());
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            collect_table_bodies(left, tables);
            collect_table_bodies(right, tables);
        }
        _ => {}
    }
}
