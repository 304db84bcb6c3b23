//! Connection pooling seam.
//!
//! The gateway is generic over [`ConnectionPool`] so guard ordering and
//! connection release can be exercised without a live server. A connection
//! handle returns itself to its pool when dropped; there is no explicit release
//! call to forget on an error path.

use std::future::Future;

use chrono::NaiveDate;
use tokio_postgres::types::ToSql;

use crate::error::DatabaseError;
use crate::value::ResultSet;

/// A positional statement parameter (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i32),
    IntArray(Vec<i32>),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl SqlParam {
    pub fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Int(value) => value,
            SqlParam::IntArray(value) => value,
            SqlParam::Text(value) => value,
            SqlParam::Bool(value) => value,
            SqlParam::Date(value) => value,
        }
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Int(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<Vec<i32>> for SqlParam {
    fn from(value: Vec<i32>) -> Self {
        SqlParam::IntArray(value)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(value: NaiveDate) -> Self {
        SqlParam::Date(value)
    }
}

/// One checked-out connection. Dropping it releases it.
pub trait Connection: Send {
    /// Runs one statement and returns all of its rows.
    fn query(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = Result<ResultSet, DatabaseError>> + Send;
}

/// A shared pool of connections.
pub trait ConnectionPool: Send + Sync {
    type Connection: Connection;

    /// Checks out a connection, waiting for one to become free if necessary.
    fn acquire(&self) -> impl Future<Output = Result<Self::Connection, DatabaseError>> + Send;
}
