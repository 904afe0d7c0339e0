#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use dynrest_api::auth::AccessLevel;
use dynrest_api::config::AppConfig;
use dynrest_api::database::ColumnInfo;
use dynrest_api::registry::{ModuleMetadata, ModuleRegistry};
use dynrest_api::server::{app, AppState};
use dynrest_api::testing::{MemoryCatalog, MemoryKeyStore, RecordingExecutor};
use dynrest_api::types::Verb;

pub const READ_KEY: &str = "read-key";
pub const UPDATE_KEY: &str = "update-key";
pub const READ_UPDATE_KEY: &str = "read-update-key";
pub const DELETE_KEY: &str = "delete-key";
pub const EXPIRED_KEY: &str = "expired-key";
pub const INACTIVE_KEY: &str = "inactive-key";

/// Router over in-memory seams with a `users` table and a read-only `messages` module
pub struct TestApp {
    pub router: Router,
    pub executor: Arc<RecordingExecutor>,
    pub keys: Arc<MemoryKeyStore>,
    pub catalog: Arc<MemoryCatalog>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self::build(test_config(), rows)
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, vec![])
    }

    /// Executor answers every statement with `rows`
    pub fn build(config: AppConfig, rows: Vec<Value>) -> Self {
        let catalog = Arc::new(
            MemoryCatalog::new()
                .with_table(
                    "users",
                    vec![
                        ColumnInfo::new("id", "int4"),
                        ColumnInfo::new("username", "text"),
                        ColumnInfo::new("full_name", "text"),
                        ColumnInfo::new("status", "text"),
                        ColumnInfo::new("age", "int4"),
                    ],
                    Some("id"),
                )
                .with_table(
                    "messages",
                    vec![ColumnInfo::new("id", "int4"), ColumnInfo::new("body", "text")],
                    Some("id"),
                ),
        );

        let registry = ModuleRegistry::from_modules([
            ModuleMetadata::new("users", "users", &Verb::ALL),
            ModuleMetadata::new("messages", "messages", &[Verb::Get]),
            ModuleMetadata::new("ghosts", "ghosts", &Verb::ALL),
        ])
        .expect("valid registry");

        let keys = Arc::new(MemoryKeyStore::new());
        let later = Utc::now() + Duration::days(30);
        keys.add(READ_KEY, AccessLevel::Read, later, true);
        keys.add(UPDATE_KEY, AccessLevel::Update, later, true);
        keys.add(READ_UPDATE_KEY, AccessLevel::ReadUpdate, later, true);
        keys.add(DELETE_KEY, AccessLevel::Delete, later, true);
        keys.add(EXPIRED_KEY, AccessLevel::ReadUpdate, Utc::now() - Duration::hours(1), true);
        keys.add(INACTIVE_KEY, AccessLevel::ReadUpdate, later, false);

        let executor = Arc::new(RecordingExecutor::new().with_rows(rows));
        let state = AppState::new(registry, catalog.clone(), executor.clone(), keys.clone(), config);

        Self {
            router: app(state),
            executor,
            keys,
            catalog,
        }
    }

    /// Wrap a router built elsewhere; the in-memory seams are unused
    pub fn from_router(router: Router) -> Self {
        Self {
            router,
            executor: Arc::new(RecordingExecutor::new()),
            keys: Arc::new(MemoryKeyStore::new()),
            catalog: Arc::new(MemoryCatalog::new()),
        }
    }

    /// Send a request through the router and return status plus parsed JSON body
    pub async fn send(&self, method: &str, uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body)?).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> Result<(StatusCode, Value)> {
        self.send("GET", uri, headers, None).await
    }
}

/// Development defaults with request tracing and CORS out of the way
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.api.enable_request_logging = false;
    config.security.enable_cors = false;
    config.query.max_limit = Some(1000);
    config.query.default_search_limit = 20;
    config.query.collapse_single_row = false;
    config.schema.enable_cache = true;
    config
}
