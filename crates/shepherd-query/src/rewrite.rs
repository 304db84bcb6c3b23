//! Row-level permission rewriting.
//!
//! Scopes every occurrence of the protected view to the rows a non-administrator
//! caller may see.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Original Query                               │
//! │  SELECT p.id FROM vw_people p                 │
//! │  WHERE p.birth_date > '2000-01-01'            │
//! └───────────────────────┬──────────────────────┘
//!                         │
//!                         ▼
//! ┌──────────────────────────────────────────────┐
//! │  Row-Level Rewriter (post-order AST visit)    │
//! │  - find vw_people in FROM / JOIN items        │
//! │  - qualify by alias (p) or table reference    │
//! │  - AND a parenthesised scope predicate        │
//! └───────────────────────┬──────────────────────┘
//!                         │
//!                         ▼
//! ┌──────────────────────────────────────────────┐
//! │  Rewritten Query                              │
//! │  SELECT p.id FROM vw_people AS p              │
//! │  WHERE (p.birth_date > '2000-01-01')          │
//! │    AND (p.id IN (<caller's ministries>)       │
//! │         OR p.id IN (<caller's own record>))   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! An occurrence renamed through a column alias list (`vw_people AS v(a, b)`)
//! is replaced by a derived table that filters the view before the rename, so
//! the predicate always binds to the view's own `id`.
//!
//! The rewrite counts occurrences of the view before it starts and refuses to
//! return a statement in which any occurrence was left unscoped.

use std::ops::ControlFlow;

use shepherd_types::{PersonId, RoleId, UserId};
use sqlparser::ast::{
    BinaryOperator, Expr, Query, Select, SetExpr, Statement, TableAlias, TableFactor,
    TableWithJoins, VisitMut, VisitorMut, visit_relations,
};
use tracing::{debug, info};

use crate::ast::{parse_expr, parse_query, relation_key, require_identifier, screen};
use crate::error::{QueryError, Result};

/// Everything the rewriter needs to know about the caller and the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScope {
    pub user_id: UserId,
    /// The caller's resolved person record.
    pub person_id: PersonId,
    /// Ministry roles (leader, collaborator) that grant visibility.
    pub allowed_roles: [RoleId; 2],
    pub protected_view: String,
    /// `(person_id, ministry_id, role_id)` membership rows.
    pub membership_table: String,
    /// `(id, user_id)` person rows.
    pub people_table: String,
}

impl RowScope {
    /// A scope over the default schema: `vw_people`, `people_ministries`, `people`.
    pub fn new(user_id: UserId, person_id: PersonId, allowed_roles: [RoleId; 2]) -> Self {
        Self {
            user_id,
            person_id,
            allowed_roles,
            protected_view: "vw_people".to_string(),
            membership_table: "people_ministries".to_string(),
            people_table: "people".to_string(),
        }
    }

    pub fn with_tables(
        mut self,
        protected_view: impl Into<String>,
        membership_table: impl Into<String>,
        people_table: impl Into<String>,
    ) -> Self {
        self.protected_view = protected_view.into();
        self.membership_table = membership_table.into();
        self.people_table = people_table.into();
        self
    }

    fn validate(&self) -> Result<()> {
        require_identifier(&self.protected_view)?;
        require_identifier(&self.membership_table)?;
        require_identifier(&self.people_table)
    }

    /// Scope predicate for one occurrence of the view, qualified by `target`.
    ///
    /// Every inner column is qualified by a `shepherd_rls_*` alias so the
    /// caller's own columns can never be captured.
    fn predicate_sql(&self, target: &str) -> String {
        let [leader, collaborator] = self.allowed_roles;
        format!(
            "{target}.id IN (\
                SELECT shepherd_rls_members.person_id \
                FROM {members} AS shepherd_rls_members \
                WHERE shepherd_rls_members.ministry_id IN (\
                    SELECT shepherd_rls_roles.ministry_id \
                    FROM {members} AS shepherd_rls_roles \
                    WHERE shepherd_rls_roles.person_id = {person} \
                    AND shepherd_rls_roles.role_id IN ({leader}, {collaborator}))) \
             OR {target}.id IN (\
                SELECT shepherd_rls_self.id \
                FROM {people} AS shepherd_rls_self \
                WHERE shepherd_rls_self.user_id = {user})",
            members = self.membership_table,
            people = self.people_table,
            person = self.person_id.get(),
            user = self.user_id.get(),
            leader = leader.get(),
            collaborator = collaborator.get(),
        )
    }
}

/// Output of a successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    /// Serialized statements, joined with `"; "`.
    pub sql: String,
    /// Number of view occurrences that received a scope predicate.
    pub scoped: usize,
}

impl Rewritten {
    pub fn was_scoped(&self) -> bool {
        self.scoped > 0
    }
}

/// Rewrites `sql` so that every occurrence of the protected view is scoped to `scope`.
///
/// Statements that never reference the view come back re-serialized but
/// otherwise unchanged.
///
/// # Errors
///
/// Fails when the text cannot be parsed, when it contains a statement that is
/// not a query, or when an occurrence of the view sits somewhere no predicate
/// can be attached (for example `TABLE vw_people`).
pub fn rewrite(sql: &str, scope: &RowScope) -> Result<Rewritten> {
    scope.validate()?;
    let mut statements = screen(sql)?;
    let view = scope.protected_view.to_ascii_lowercase();

    let mut scoped = 0;
    for statement in &mut statements {
        if !matches!(statement, Statement::Query(_)) {
            return Err(QueryError::Unsupported(
                "only SELECT statements can be scoped".to_string(),
            ));
        }

        let found = count_view_references(statement, &view);
        let mut injector = Injector {
            scope,
            view: &view,
            scoped: 0,
        };
        if let ControlFlow::Break(e) = statement.visit(&mut injector) {
            return Err(e);
        }

        if injector.scoped != found {
            return Err(QueryError::IncompleteRewrite {
                view: scope.protected_view.clone(),
                found,
                scoped: injector.scoped,
            });
        }
        scoped += injector.scoped;
    }

    let sql = statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    if scoped > 0 {
        info!(
            user_id = %scope.user_id,
            person_id = %scope.person_id,
            scoped,
            "Applied row-level scope"
        );
    } else {
        debug!("No protected view referenced; statement unchanged");
    }

    Ok(Rewritten { sql, scoped })
}

fn count_view_references(statement: &Statement, view: &str) -> usize {
    let mut found = 0;
    let _ = visit_relations(statement, |name| {
        if relation_key(name).as_deref() == Some(view) {
            found += 1;
        }
        ControlFlow::<()>::Continue(())
    });
    found
}

/// Attaches scope predicates to every SELECT whose FROM clause names the view.
///
/// Runs post-order, so predicates injected into an outer query are never
/// revisited.
struct Injector<'a> {
    scope: &'a RowScope,
    view: &'a str,
    scoped: usize,
}

impl VisitorMut for Injector<'_> {
    type Break = QueryError;

    fn post_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        match self.scope_body(&mut query.body) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(e),
        }
    }
}

impl Injector<'_> {
    fn scope_body(&mut self, body: &mut SetExpr) -> Result<()> {
        match body {
            SetExpr::Select(select) => self.scope_select(select),
            SetExpr::SetOperation { left, right, .. } => {
                self.scope_body(left)?;
                self.scope_body(right)
            }
            SetExpr::Table(table)
                if table
                    .table_name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(self.view)) =>
            {
                Err(QueryError::Unsupported(format!(
                    "TABLE {} cannot be scoped; use SELECT",
                    self.view
                )))
            }
            // Parenthesised queries and CTEs are visited as queries of their own.
            _ => Ok(()),
        }
    }

    fn scope_select(&mut self, select: &mut Select) -> Result<()> {
        let mut targets = Vec::new();
        for item in &mut select.from {
            self.collect_targets(item, &mut targets)?;
        }

        for target in targets {
            let predicate = Expr::Nested(Box::new(parse_expr(&self.scope.predicate_sql(&target))?));
            select.selection = Some(match select.selection.take() {
                Some(existing) => Expr::BinaryOp {
                    left: Box::new(Expr::Nested(Box::new(existing))),
                    op: BinaryOperator::And,
                    right: Box::new(predicate),
                },
                None => predicate,
            });
            self.scoped += 1;
            debug!(target = %target, "Scoped protected view occurrence");
        }
        Ok(())
    }

    /// Qualifiers of every view occurrence among a FROM item and its joins.
    fn collect_targets(&mut self, item: &mut TableWithJoins, targets: &mut Vec<String>) -> Result<()> {
        self.collect_factor(&mut item.relation, targets)?;
        for join in &mut item.joins {
            self.collect_factor(&mut join.relation, targets)?;
        }
        Ok(())
    }

    fn collect_factor(&mut self, factor: &mut TableFactor, targets: &mut Vec<String>) -> Result<()> {
        let replacement = match factor {
            TableFactor::Table { name, alias, .. }
                if relation_key(name).as_deref() == Some(self.view) =>
            {
                match alias {
                    Some(alias) if !alias.columns.is_empty() => {
                        Some(self.scoped_derived(&name.to_string(), alias.clone())?)
                    }
                    Some(alias) => {
                        targets.push(alias.name.to_string());
                        None
                    }
                    None => {
                        targets.push(name.to_string());
                        None
                    }
                }
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.collect_targets(table_with_joins, targets)?;
                None
            }
            _ => None,
        };

        if let Some(derived) = replacement {
            *factor = derived;
            self.scoped += 1;
        }
        Ok(())
    }

    /// `(SELECT * FROM <view> WHERE <scope>) AS <alias>(<columns>)`.
    fn scoped_derived(&self, view: &str, alias: TableAlias) -> Result<TableFactor> {
        let subquery = parse_query(&format!(
            "SELECT * FROM {view} WHERE ({})",
            self.scope.predicate_sql(view)
        ))?;
        debug!(alias = %alias.name, "Scoped column-aliased view occurrence");
        Ok(TableFactor::Derived {
            lateral: false,
            subquery,
            alias: Some(alias),
            sample: None,
        })
    }
}
