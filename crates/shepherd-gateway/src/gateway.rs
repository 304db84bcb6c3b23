//! The execution facade.
//!
//! Three entry points, by trust level:
//!
//! | Path                | Private-table guard | Read-only check | Row scoping  | SQL source        |
//! |---------------------|---------------------|-----------------|--------------|-------------------|
//! | [`run_read_only`]   | yes                 | yes             | non-admins   | caller text       |
//! | [`run_guarded`]     | yes                 | no              | no           | mutation code     |
//! | [`run_private`]     | no                  | no              | no           | `'static` only    |
//!
//! Every call checks out exactly one connection. The handle is dropped on every
//! exit path, so a guard rejection or a failed statement never leaks it.
//!
//! [`run_read_only`]: Gateway::run_read_only
//! [`run_guarded`]: Gateway::run_guarded
//! [`run_private`]: Gateway::run_private

use std::time::Duration;

use shepherd_config::ShepherdConfig;
use shepherd_query::{RowScope, TablePolicy, is_read_only, rewrite, screen};
use shepherd_rbac::{AccessRoles, CallerContext, Denial};
use shepherd_types::PersonId;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditLog;
use crate::error::{GatewayError, GatewayResult};
use crate::guard::Authorizer;
use crate::pool::{Connection, ConnectionPool, SqlParam};
use crate::value::{ResultSet, Value};

const RESOLVE_PERSON_SQL: &str = "SELECT person_id FROM users WHERE id = $1::int";

/// Table names the row-level predicate is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTables {
    pub protected_view: String,
    pub membership_table: String,
    pub people_table: String,
}

impl Default for ScopeTables {
    fn default() -> Self {
        Self {
            protected_view: "vw_people".to_string(),
            membership_table: "people_ministries".to_string(),
            people_table: "people".to_string(),
        }
    }
}

/// Limits applied to the read-only path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Time the gateway waits for a result. Elapsing abandons the wait only;
    /// the server may keep executing the statement.
    pub timeout: Duration,
    pub max_rows: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_rows: 1000,
        }
    }
}

/// Permission-aware SQL gateway over a connection pool.
pub struct Gateway<P> {
    pool: P,
    roles: AccessRoles,
    tables: TablePolicy,
    scope_tables: ScopeTables,
    limits: QueryLimits,
}

impl<P: ConnectionPool> Gateway<P> {
    /// Creates a gateway with the default deny-list, schema names and limits.
    pub fn new(pool: P, roles: AccessRoles) -> Self {
        Self {
            pool,
            roles,
            tables: TablePolicy::default(),
            scope_tables: ScopeTables::default(),
            limits: QueryLimits::default(),
        }
    }

    pub fn from_config(pool: P, config: &ShepherdConfig) -> Self {
        let access = &config.access;
        Self::new(pool, access.roles())
            .with_table_policy(access.table_policy())
            .with_scope_tables(ScopeTables {
                protected_view: access.protected_view.clone(),
                membership_table: access.membership_table.clone(),
                people_table: access.people_table.clone(),
            })
            .with_limits(QueryLimits {
                timeout: config.query.timeout(),
                max_rows: config.query.max_rows,
            })
    }

    pub fn with_table_policy(mut self, tables: TablePolicy) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_scope_tables(mut self, scope_tables: ScopeTables) -> Self {
        self.scope_tables = scope_tables;
        self
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn roles(&self) -> &AccessRoles {
        &self.roles
    }

    pub fn table_policy(&self) -> &TablePolicy {
        &self.tables
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Identity and authorization checks that run before a mutation.
    pub fn authorizer(&self) -> Authorizer<'_, P> {
        Authorizer::new(self)
    }

    pub fn audit_log(&self) -> AuditLog<'_, P> {
        AuditLog::new(self)
    }

    /// Runs caller-supplied SQL that must be read-only.
    ///
    /// Non-administrators only ever see protected-view rows of ministries they
    /// lead or collaborate in, plus their own record.
    ///
    /// # Errors
    ///
    /// Empty text, more than one statement, writes and private tables are all
    /// rejected before any connection is checked out.
    #[instrument(skip_all, fields(user_id = %caller.user_id()))]
    pub async fn run_read_only(&self, caller: &CallerContext, sql: &str) -> GatewayResult<ResultSet> {
        if sql.trim().is_empty() {
            return Err(GatewayError::Validation("query text is required".to_string()));
        }
        if !is_read_only(sql) {
            warn!("Write rejected on read-only path");
            return Err(GatewayError::WriteNotPermitted);
        }
        self.check_tables(sql)?;

        let statements = screen(sql)?;
        if statements.len() != 1 {
            return Err(GatewayError::Validation(format!(
                "expected exactly one statement, got {}",
                statements.len()
            )));
        }

        let effective = if self.roles.is_admin(caller.role()) {
            debug!("Administrator bypasses row-level scope");
            sql.to_string()
        } else {
            let person = self.resolve_person(caller).await?;
            rewrite(sql, &self.row_scope(caller, person))?.sql
        };

        let mut result = match tokio::time::timeout(
            self.limits.timeout,
            self.execute("read-only query", &effective, &[]),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_ms = self.limits.timeout.as_millis(), "Read-only query timed out");
                return Err(GatewayError::Timeout(self.limits.timeout));
            }
        };

        result.truncate(self.limits.max_rows);
        info!(rows = result.len(), truncated = result.truncated, "Read-only query completed");
        Ok(result)
    }

    /// Runs any statement, read or write, that touches no private table.
    ///
    /// Mutation code calls the [`Authorizer`] checks before this.
    #[instrument(skip_all)]
    pub async fn run_guarded(&self, sql: &str, params: &[SqlParam]) -> GatewayResult<ResultSet> {
        if sql.trim().is_empty() {
            return Err(GatewayError::Validation("query text is required".to_string()));
        }
        self.check_tables(sql)?;
        self.execute("guarded statement", sql, params).await
    }

    /// Runs internal SQL against any table, private ones included.
    ///
    /// Only compile-time SQL is accepted, so caller text can never get here.
    #[instrument(skip_all)]
    pub async fn run_private(&self, sql: &'static str, params: &[SqlParam]) -> GatewayResult<ResultSet> {
        self.execute("private statement", sql, params).await
    }

    /// Resolves the caller's linked person record, caching it in the caller's context.
    ///
    /// # Errors
    ///
    /// Returns [`Denial::NoLinkedPerson`] when the account has no person record.
    pub async fn resolve_person(&self, caller: &CallerContext) -> GatewayResult<PersonId> {
        if let Some(person) = caller.cached_person() {
            return Ok(person);
        }

        let rows = self
            .run_private(RESOLVE_PERSON_SQL, &[SqlParam::Int(caller.user_id().get())])
            .await?;
        let person = match rows.first_value() {
            Some(Value::Int(id)) => i32::try_from(*id).ok().map(PersonId::new),
            _ => None,
        }
        .filter(|p| p.is_valid());

        match person {
            Some(person) => {
                caller.remember_person(person);
                Ok(person)
            }
            None => {
                warn!(user_id = %caller.user_id(), "Caller has no linked person record");
                Err(Denial::NoLinkedPerson {
                    user: caller.user_id(),
                }
                .into())
            }
        }
    }

    fn row_scope(&self, caller: &CallerContext, person: PersonId) -> RowScope {
        RowScope::new(caller.user_id(), person, self.roles.allowed()).with_tables(
            self.scope_tables.protected_view.clone(),
            self.scope_tables.membership_table.clone(),
            self.scope_tables.people_table.clone(),
        )
    }

    fn check_tables(&self, sql: &str) -> GatewayResult<()> {
        match self.tables.denied_tables(sql) {
            Some(found) if found.is_empty() => Ok(()),
            Some(found) => Err(GatewayError::PrivateTable {
                tables: found.into_iter().collect(),
            }),
            None => Err(GatewayError::PrivateTable { tables: Vec::new() }),
        }
    }

    async fn execute(&self, operation: &'static str, sql: &str, params: &[SqlParam]) -> GatewayResult<ResultSet> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| GatewayError::database(operation, e))?;
        debug!(operation, params = params.len(), "Executing statement");
        conn.query(sql, params)
            .await
            .map_err(|e| GatewayError::database(operation, e))
    }
}
