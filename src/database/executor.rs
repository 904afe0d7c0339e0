use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::QueryScalar;
use sqlx::Postgres;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::manager::DatabaseError;
use super::schema::ColumnInfo;
use crate::config::DatabaseConfig;
use crate::query::{SqlResult, SqlType, SqlValue};

/// Runs built statements and returns every result row as a JSON object
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn fetch(&self, statement: &SqlResult) -> Result<Vec<Value>, DatabaseError>;
}

/// Table introspection
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Columns of a `public` table in ordinal order; empty when the table does not exist
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError>;

    /// Single-column primary key, if the table has one
    async fn primary_key(&self, table: &str) -> Result<Option<String>, DatabaseError>;

    async fn describe(&self, table: &str) -> Result<(Vec<ColumnInfo>, Option<String>), DatabaseError> {
        futures::try_join!(self.columns(table), self.primary_key(table))
    }
}

/// Postgres implementation of both seams over one pool
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
    config: DatabaseConfig,
}

impl PgExecutor {
    pub fn new(pool: PgPool, config: DatabaseConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wrap a statement so each row comes back as one `json` value, whatever its column types.
    ///
    /// The outer query has no ORDER BY of its own. `MATERIALIZED` keeps the planner from
    /// inlining the statement, so rows are read back from the CTE scan in the order the
    /// statement's own ORDER BY produced them (needs Postgres 12 or later).
    fn json_rows_sql(statement: &str) -> String {
        format!("WITH t AS MATERIALIZED ({}) SELECT row_to_json(t) AS row FROM t", statement)
    }

    fn bind<'q>(
        query: QueryScalar<'q, Postgres, Value, PgArguments>,
        value: &SqlValue,
    ) -> QueryScalar<'q, Postgres, Value, PgArguments> {
        match value.clone() {
            SqlValue::Null(ty) => match ty {
                SqlType::Bool => query.bind(None::<bool>),
                SqlType::Int => query.bind(None::<i64>),
                SqlType::Float => query.bind(None::<f64>),
                SqlType::Numeric => query.bind(None::<sqlx::types::BigDecimal>),
                SqlType::Text | SqlType::Other => query.bind(None::<String>),
                SqlType::Uuid => query.bind(None::<uuid::Uuid>),
                SqlType::Timestamptz => query.bind(None::<chrono::DateTime<chrono::Utc>>),
                SqlType::Timestamp => query.bind(None::<chrono::NaiveDateTime>),
                SqlType::Date => query.bind(None::<chrono::NaiveDate>),
                SqlType::Json => query.bind(None::<sqlx::types::Json<Value>>),
            },
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::Int(i) => query.bind(i),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Numeric(n) => query.bind(n),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Uuid(u) => query.bind(u),
            SqlValue::Timestamptz(t) => query.bind(t),
            SqlValue::Timestamp(t) => query.bind(t),
            SqlValue::Date(d) => query.bind(d),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
            SqlValue::Cast { text, .. } => query.bind(text),
        }
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn fetch(&self, statement: &SqlResult) -> Result<Vec<Value>, DatabaseError> {
        let sql = Self::json_rows_sql(&statement.query);
        if self.config.enable_query_logging {
            debug!("SQL: {} ({} params)", statement.query, statement.params.len());
        }

        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        for value in &statement.params {
            query = Self::bind(query, value);
        }

        let started = Instant::now();
        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            error!("Statement failed: {} ({})", statement.query, e);
            DatabaseError::from(e)
        })?;

        let elapsed = started.elapsed();
        if self.config.enable_slow_query_warning
            && elapsed.as_millis() as u64 > self.config.slow_query_threshold_ms
        {
            warn!("Slow query ({} ms): {}", elapsed.as_millis(), statement.query);
        }
        Ok(rows)
    }
}

#[async_trait]
impl Catalog for PgExecutor {
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT column_name::text, udt_name::text FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name, pg_type)| ColumnInfo::new(name, pg_type)).collect())
    }

    async fn primary_key(&self, table: &str) -> Result<Option<String>, DatabaseError> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT a.attname::text FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = to_regclass(format('%I.%I', 'public', $1::text)) AND i.indisprimary",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        match keys.len() {
            1 => Ok(keys.into_iter().next()),
            0 => Ok(None),
            _ => {
                debug!("Table {} has a composite primary key; treating it as keyless", table);
                Ok(None)
            }
        }
    }
}
