//! Introspected table structure and the schema cache.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::executor::Catalog;
use crate::query::{QueryError, SqlType};
use crate::registry::is_valid_identifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Catalog `udt_name`, e.g. `int4`, `text`, `timestamptz`
    pub pg_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, pg_type: impl Into<String>) -> Self {
        Self { name: name.into(), pg_type: pg_type.into() }
    }

    pub fn sql_type(&self) -> SqlType {
        SqlType::from_udt_name(&self.pg_type)
    }
}

/// Columns and primary key of one table. Immutable once loaded; reload to pick up DDL changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_key: Option<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>, primary_key: Option<String>) -> Self {
        Self { name: name.into(), columns, primary_key }
    }

    /// Schema whose columns are all text-typed
    pub fn from_names(name: &str, columns: &[&str], primary_key: Option<&str>) -> Self {
        Self::new(
            name,
            columns.iter().map(|c| ColumnInfo::new(*c, "text")).collect(),
            primary_key.map(str::to_string),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Exact, case-sensitive lookup
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Loads `TableSchema` values through a `Catalog`, optionally caching them by table name
pub struct SchemaCache {
    catalog: Arc<dyn Catalog>,
    enabled: bool,
    entries: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaCache {
    pub fn new(catalog: Arc<dyn Catalog>, enabled: bool) -> Self {
        Self {
            catalog,
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load(&self, name: &str) -> Result<Arc<TableSchema>, QueryError> {
        if !is_valid_identifier(name) {
            return Err(QueryError::validation(format!("Invalid schema name: {}", name)));
        }

        if self.enabled {
            let entries = self.entries.read().await;
            if let Some(schema) = entries.get(name) {
                return Ok(schema.clone());
            }
        }

        let (columns, primary_key) = self.catalog.describe(name).await?;
        if columns.is_empty() {
            return Err(QueryError::not_found(format!("Schema \"{}\" does not exist", name)));
        }
        let schema = Arc::new(TableSchema::new(name, columns, primary_key));
        debug!("Loaded schema {} ({} columns)", name, schema.columns().len());

        if self.enabled {
            let mut entries = self.entries.write().await;
            entries.insert(name.to_string(), schema.clone());
        }
        Ok(schema)
    }

    pub async fn invalidate(&self, name: &str) {
        if self.entries.write().await.remove(name).is_some() {
            info!("Invalidated cached schema: {}", name);
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn cached(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
