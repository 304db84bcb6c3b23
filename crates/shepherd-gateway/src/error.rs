//! Gateway error types.

use std::time::Duration;

use shepherd_query::QueryError;
use shepherd_rbac::{ClaimError, Denial};
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures raised by a connection pool or a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// No connection could be obtained.
    #[error("connection pool unavailable: {0}")]
    Pool(String),

    /// The server rejected or failed the statement.
    #[error("{message}")]
    Statement {
        /// SQLSTATE, when the server reported one.
        code: Option<String>,
        message: String,
    },

    /// A column could not be decoded.
    #[error("failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },

    /// The result did not have the shape the caller relied on.
    #[error("unexpected result: {0}")]
    UnexpectedResult(String),
}

impl DatabaseError {
    /// Short remediation hint suitable for relaying to the caller.
    pub fn hint(&self) -> &'static str {
        match self {
            DatabaseError::Pool(_) => "the database is unreachable; retry later",
            DatabaseError::Statement { code, .. } => match code.as_deref() {
                Some("42703") => "re-check the column names against the schema",
                Some("42P01") => "re-check the table or view name against the schema",
                Some("42601") => "re-check the SQL syntax",
                Some("22P02" | "22007" | "22008") => "re-check the format of the values used",
                Some("23505") => "the record already exists",
                Some("23503") => "a referenced record does not exist; re-check the ids",
                Some("57014") => "the statement was cancelled; simplify the query",
                _ => "check the statement and its values, then retry",
            },
            DatabaseError::Decode { .. } => "select columns of simpler types or cast them to text",
            DatabaseError::UnexpectedResult(_) => "report this to an administrator",
        }
    }
}

/// Errors returned by the gateway.
///
/// [`GatewayError::Authorization`] is always distinct from an empty result:
/// callers can tell "forbidden" from "found nothing".
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected before any database round trip.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Non read-only text submitted to the read-only path.
    #[error("write operations not permitted: only SELECT statements may run here")]
    WriteNotPermitted,

    /// The statement references deny-listed tables (or could not be parsed).
    #[error("access denied: query references private tables{}", format_tables(.tables))]
    PrivateTable { tables: Vec<String> },

    /// The row-level rewrite could not be applied.
    #[error("query cannot be scoped to the caller's permissions: {0}")]
    Rewrite(#[from] QueryError),

    /// An authorization check said no.
    #[error("not authorized: {0}")]
    Authorization(#[from] Denial),

    /// A record the mutation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The mutation would duplicate or contradict existing data.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The read-only path gave up waiting.
    #[error("query exceeded the {}ms time limit", .0.as_millis())]
    Timeout(Duration),

    /// Connection or statement failure, wrapped with what was being attempted.
    #[error("{operation} failed: {source} (hint: {})", .source.hint())]
    Database {
        operation: &'static str,
        #[source]
        source: DatabaseError,
    },
}

impl GatewayError {
    pub fn database(operation: &'static str, source: DatabaseError) -> Self {
        GatewayError::Database { operation, source }
    }

    /// True when the request was refused for lack of permission.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            GatewayError::Authorization(_)
                | GatewayError::PrivateTable { .. }
                | GatewayError::WriteNotPermitted
        )
    }
}

impl From<ClaimError> for GatewayError {
    fn from(err: ClaimError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

fn format_tables(tables: &[String]) -> String {
    if tables.is_empty() {
        String::new()
    } else {
        format!(" ({})", tables.join(", "))
    }
}
