use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool};
use tracing::info;

use super::api_key::{ApiKeyRecord, ApiKeyRow, NewApiKey};
use crate::database::DatabaseError;

const API_KEYS_DDL: &str = include_str!("../../sql/api_keys.sql");

const SELECT_COLUMNS: &str = "id, key, label, created_at, expires_at, is_active, access";

/// Persistence for API keys
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, DatabaseError>;

    /// Mark an active key inactive. Returns false when the key was already inactive or is gone.
    async fn deactivate(&self, id: i32) -> Result<bool, DatabaseError>;

    async fn list(&self) -> Result<Vec<ApiKeyRecord>, DatabaseError>;

    async fn insert(&self, key: NewApiKey) -> Result<ApiKeyRecord, DatabaseError>;

    /// Flip `is_active`; `None` when no key has this id
    async fn toggle_active(&self, id: i32) -> Result<Option<ApiKeyRecord>, DatabaseError>;

    /// Set a new expiry and mark the key active; `None` when no key has this id
    async fn reactivate(&self, id: i32, expires_at: DateTime<Utc>) -> Result<Option<ApiKeyRecord>, DatabaseError>;

    async fn delete(&self, id: i32) -> Result<bool, DatabaseError>;
}

pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `api_keys` table if it does not exist
    pub async fn ensure_table(&self) -> Result<(), DatabaseError> {
        self.pool.execute(API_KEYS_DDL).await?;
        info!("Ensured api_keys table");
        Ok(())
    }

    fn into_record(row: ApiKeyRow) -> Result<ApiKeyRecord, DatabaseError> {
        ApiKeyRecord::try_from(row).map_err(DatabaseError::QueryError)
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, DatabaseError> {
        let row: Option<ApiKeyRow> =
            sqlx::query_as(&format!("SELECT {} FROM api_keys WHERE key = $1", SELECT_COLUMNS))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Self::into_record).transpose()
    }

    async fn deactivate(&self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = false WHERE id = $1 AND is_active = true")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(&self) -> Result<Vec<ApiKeyRecord>, DatabaseError> {
        let rows: Vec<ApiKeyRow> = sqlx::query_as(&format!("SELECT {} FROM api_keys ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::into_record).collect()
    }

    async fn insert(&self, key: NewApiKey) -> Result<ApiKeyRecord, DatabaseError> {
        let row: ApiKeyRow = sqlx::query_as(&format!(
            "INSERT INTO api_keys (key, label, expires_at, is_active, access) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(&key.key)
        .bind(&key.label)
        .bind(key.expires_at)
        .bind(key.is_active)
        .bind(key.access.as_str())
        .fetch_one(&self.pool)
        .await?;
        Self::into_record(row)
    }

    async fn toggle_active(&self, id: i32) -> Result<Option<ApiKeyRecord>, DatabaseError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(&format!(
            "UPDATE api_keys SET is_active = NOT is_active WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::into_record).transpose()
    }

    async fn reactivate(&self, id: i32, expires_at: DateTime<Utc>) -> Result<Option<ApiKeyRecord>, DatabaseError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(&format!(
            "UPDATE api_keys SET is_active = TRUE, expires_at = $2 WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::into_record).transpose()
    }

    async fn delete(&self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
