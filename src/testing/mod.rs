//! In-memory stand-ins for the database seams, plus a Postgres context for tests that need a
//! real server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::auth::{AccessLevel, ApiKeyRecord, ApiKeyStore, NewApiKey};
use crate::database::{Catalog, ColumnInfo, DatabaseError, DatabaseManager, SqlExecutor};
use crate::query::SqlResult;

/// Catalog over tables declared up front
#[derive(Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, (Vec<ColumnInfo>, Option<String>)>,
    calls: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnInfo>, primary_key: Option<&str>) -> Self {
        self.tables
            .insert(name.to_string(), (columns, primary_key.map(str::to_string)));
        self
    }

    /// How many times a table has been introspected
    pub fn describe_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.get(table).map(|(c, _)| c.clone()).unwrap_or_default())
    }

    async fn primary_key(&self, table: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self.tables.get(table).and_then(|(_, pk)| pk.clone()))
    }
}

/// Executor that records every statement and answers with canned rows
#[derive(Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<SqlResult>>,
    rows: Vec<Value>,
    failure: Mutex<Option<DatabaseError>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every fetch
    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows;
        self
    }

    /// Make the next fetch fail with `error`
    pub fn fail_next(&self, error: DatabaseError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    pub fn statements(&self) -> Vec<SqlResult> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn fetch(&self, statement: &SqlResult) -> Result<Vec<Value>, DatabaseError> {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(statement.clone());
        }
        if let Some(error) = self.failure.lock().ok().and_then(|mut f| f.take()) {
            return Err(error);
        }
        Ok(self.rows.clone())
    }
}

/// Key store backed by a vector
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: Mutex<Vec<ApiKeyRecord>>,
    deactivations: AtomicUsize,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: &str, access: AccessLevel, expires_at: DateTime<Utc>, is_active: bool) -> ApiKeyRecord {
        let mut keys = self.lock();
        let record = ApiKeyRecord {
            id: keys.len() as i32 + 1,
            key: key.to_string(),
            label: None,
            created_at: Utc::now(),
            expires_at,
            is_active,
            access,
        };
        keys.push(record.clone());
        record
    }

    pub fn get(&self, key: &str) -> Option<ApiKeyRecord> {
        self.lock().iter().find(|r| r.key == key).cloned()
    }

    /// Number of writes that switched a key off through `deactivate`
    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ApiKeyRecord>> {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ApiKeyStore for MemoryKeyStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, DatabaseError> {
        Ok(self.get(key))
    }

    async fn deactivate(&self, id: i32) -> Result<bool, DatabaseError> {
        let mut keys = self.lock();
        match keys.iter_mut().find(|r| r.id == id && r.is_active) {
            Some(record) => {
                record.is_active = false;
                self.deactivations.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<ApiKeyRecord>, DatabaseError> {
        Ok(self.lock().clone())
    }

    async fn insert(&self, key: NewApiKey) -> Result<ApiKeyRecord, DatabaseError> {
        if self.get(&key.key).is_some() {
            return Err(DatabaseError::QueryError("duplicate key".to_string()));
        }
        let mut record = self.add(&key.key, key.access, key.expires_at, key.is_active);
        record.label = key.label;
        let mut keys = self.lock();
        if let Some(stored) = keys.iter_mut().find(|r| r.id == record.id) {
            stored.label = record.label.clone();
        }
        Ok(record)
    }

    async fn toggle_active(&self, id: i32) -> Result<Option<ApiKeyRecord>, DatabaseError> {
        let mut keys = self.lock();
        Ok(keys.iter_mut().find(|r| r.id == id).map(|record| {
            record.is_active = !record.is_active;
            record.clone()
        }))
    }

    async fn reactivate(&self, id: i32, expires_at: DateTime<Utc>) -> Result<Option<ApiKeyRecord>, DatabaseError> {
        let mut keys = self.lock();
        Ok(keys.iter_mut().find(|r| r.id == id).map(|record| {
            record.is_active = true;
            record.expires_at = expires_at;
            record.clone()
        }))
    }

    async fn delete(&self, id: i32) -> Result<bool, DatabaseError> {
        let mut keys = self.lock();
        let before = keys.len();
        keys.retain(|r| r.id != id);
        Ok(keys.len() < before)
    }
}

/// Scratch tables on the database named by `DATABASE_URL`
pub struct TestContext {
    pool: sqlx::PgPool,
    created_tables: Vec<String>,
    created_types: Vec<String>,
}

impl TestContext {
    /// `None` when `DATABASE_URL` is not set, so database tests can skip themselves
    pub async fn connect() -> anyhow::Result<Option<Self>> {
        if std::env::var("DATABASE_URL").is_err() {
            return Ok(None);
        }
        let pool = DatabaseManager::connect(&crate::config::config().database)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect test database: {}", e))?;
        Ok(Some(Self {
            pool,
            created_tables: Vec::new(),
            created_types: Vec::new(),
        }))
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    /// Create a uniquely named table from a column definition list and return its name
    pub async fn create_table(&mut self, prefix: &str, columns_ddl: &str) -> anyhow::Result<String> {
        let name = format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12]);
        sqlx::query(&format!("CREATE TABLE \"{}\" ({})", name, columns_ddl))
            .execute(&self.pool)
            .await?;
        self.created_tables.push(name.clone());
        Ok(name)
    }

    /// Create a uniquely named enum type and return its name
    pub async fn create_enum(&mut self, prefix: &str, labels: &[&str]) -> anyhow::Result<String> {
        let name = format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12]);
        let labels: Vec<String> = labels.iter().map(|l| format!("'{}'", l.replace('\'', "''"))).collect();
        sqlx::query(&format!("CREATE TYPE \"{}\" AS ENUM ({})", name, labels.join(", ")))
            .execute(&self.pool)
            .await?;
        self.created_types.push(name.clone());
        Ok(name)
    }

    /// Drop every table, then every type, created through this context
    pub async fn cleanup(&mut self) -> anyhow::Result<()> {
        for table in self.created_tables.drain(..) {
            sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
                .execute(&self.pool)
                .await?;
        }
        for ty in self.created_types.drain(..) {
            sqlx::query(&format!("DROP TYPE IF EXISTS \"{}\"", ty))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
