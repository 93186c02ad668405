use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;
use thiserror::Error;

use crate::config;
use crate::filter::{Filter, FilterData, FilterError};
use crate::query::Collection;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Query cannot be compiled: {0}")]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Query timed out after {0}ms")]
    Timeout(u64),
}

/// Runs a concrete (fully substituted) query document against a collection
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, ExecutorError>;
}

/// Compiles the document to SQL and returns each row as a JSON object
#[derive(Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute(&self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, ExecutorError> {
        let mut compiled = Filter::new(collection);
        compiled.assign(filter)?;
        let sql_result = compiled.to_sql()?;

        let query_config = &config::config().query;
        if query_config.debug_logging {
            tracing::debug!("{}: {} {:?}", collection, sql_result.query, sql_result.params);
        }

        let sql = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql_result.query);
        let mut q = sqlx::query(&sql);
        for param in sql_result.params {
            q = bind_param(q, param);
        }

        let timeout_ms = config::config().database.query_timeout_ms;
        let rows = tokio::time::timeout(Duration::from_millis(timeout_ms), q.fetch_all(&self.pool))
            .await
            .map_err(|_| ExecutorError::Timeout(timeout_ms))??;

        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(ExecutorError::from))
            .collect()
    }
}

/// Bind a JSON value with the closest Postgres type. Strings always bind as text;
/// timestamp columns get an explicit `::timestamptz` cast from the filter compiler.
fn bind_param(
    q: sqlx::query::Query<'_, Postgres, PgArguments>,
    v: Value,
) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    match v {
        Value::Null => q.bind(None::<String>),
        Value::Bool(b) => q.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        other => q.bind(Json(other)),
    }
}
