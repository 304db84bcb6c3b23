//! PostgreSQL implementation of the pooling seam, backed by `deadpool-postgres`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Object, Pool, PoolConfig, Runtime};
use rust_decimal::Decimal;
use shepherd_config::DatabaseConfig;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::pool::{Connection, ConnectionPool, SqlParam};
use crate::value::{ResultSet, Value};

/// Pool of PostgreSQL connections.
#[derive(Clone)]
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Creates a pool from configuration. Connections are opened lazily.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = deadpool_postgres::Config::new();
        if let Some(url) = &config.url {
            cfg.url = Some(url.clone());
        } else {
            cfg.host = Some(config.host.clone());
            cfg.port = Some(config.port);
            cfg.dbname = Some(config.name.clone());
            cfg.user = Some(config.user.clone());
            cfg.password.clone_from(&config.password);
        }
        cfg.pool = Some(PoolConfig::new(config.max_connections));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "PostgreSQL pool created"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

impl ConnectionPool for PgPool {
    type Connection = PgConnection;

    async fn acquire(&self) -> Result<PgConnection, DatabaseError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(PgConnection { client })
    }
}

/// A pooled PostgreSQL connection. Returns to the pool on drop.
pub struct PgConnection {
    client: Object,
}

impl Connection for PgConnection {
    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<ResultSet, DatabaseError> {
        let statement = self.client.prepare(sql).await.map_err(statement_error)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(SqlParam::as_tosql).collect();
        let rows = self
            .client
            .query(&statement, &refs)
            .await
            .map_err(statement_error)?;
        debug!(rows = rows.len(), "Statement executed");

        let rows = rows.iter().map(row_values).collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet::new(columns, rows))
    }
}

fn statement_error(err: tokio_postgres::Error) -> DatabaseError {
    match err.as_db_error() {
        Some(db) => DatabaseError::Statement {
            code: Some(db.code().code().to_string()),
            message: db.message().to_string(),
        },
        None => DatabaseError::Statement {
            code: err.code().map(|c| c.code().to_string()),
            message: err.to_string(),
        },
    }
}

fn row_values(row: &Row) -> Result<Vec<Value>, DatabaseError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let decoded = match *ty {
            Type::BOOL => row
                .try_get::<_, Option<bool>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Bool)),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map_or(Value::Null, |v| Value::Int(i64::from(v)))),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map_or(Value::Null, |v| Value::Int(i64::from(v)))),
            Type::INT8 => row
                .try_get::<_, Option<i64>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Int)),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map_or(Value::Null, |v| Value::Float(f64::from(v)))),
            Type::FLOAT8 => row
                .try_get::<_, Option<f64>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Float)),
            Type::NUMERIC => row
                .try_get::<_, Option<Decimal>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Decimal)),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => row
                .try_get::<_, Option<String>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Text)),
            Type::DATE => row
                .try_get::<_, Option<NaiveDate>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Date)),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Timestamp)),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| v.map_or(Value::Null, Value::TimestampTz)),
            Type::JSON | Type::JSONB => row
                .try_get::<_, Option<serde_json::Value>>(idx)
                .map(|v| v.map_or(Value::Null, Value::Json)),
            _ => Ok(Value::Unsupported(ty.name().to_string())),
        }
        .map_err(|e| DatabaseError::Decode {
            column: column.name().to_string(),
            reason: e.to_string(),
        })?;
        values.push(decoded);
    }
    Ok(values)
}
