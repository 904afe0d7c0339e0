use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::{ApiKeyGate, ApiKeyStore, PgApiKeyStore};
use crate::config::AppConfig;
use crate::database::{Catalog, DatabaseManager, PgExecutor, SchemaCache, SqlExecutor};
use crate::error::ApiError;
use crate::handlers::{module_request, record_request};
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::ModuleRegistry;

/// Everything a request handler needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModuleRegistry>,
    pub schemas: Arc<SchemaCache>,
    pub executor: Arc<dyn SqlExecutor>,
    pub gate: ApiKeyGate,
    pub config: Arc<AppConfig>,
    /// Pool reported by `/health`; absent when running over in-memory seams
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        registry: ModuleRegistry,
        catalog: Arc<dyn Catalog>,
        executor: Arc<dyn SqlExecutor>,
        key_store: Arc<dyn ApiKeyStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            schemas: Arc::new(SchemaCache::new(catalog, config.schema.enable_cache)),
            executor,
            gate: ApiKeyGate::new(key_store),
            config: Arc::new(config),
            pool: None,
        }
    }

    /// State wired to Postgres for every seam
    pub fn postgres(pool: PgPool, registry: ModuleRegistry, config: AppConfig) -> Self {
        let executor = Arc::new(PgExecutor::new(pool.clone(), config.database.clone()));
        let keys = Arc::new(PgApiKeyStore::new(pool.clone()));
        let mut state = Self::new(registry, executor.clone(), executor, keys, config);
        state.pool = Some(pool);
        state
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Dynamic modules (API key required)
        .route(
            "/api/:module",
            get(module_request)
                .post(module_request)
                .put(module_request)
                .delete(module_request),
        )
        .route("/api/:module/:pk", get(record_request))
        .fallback(not_found)
        .with_state(state)
        // Body size is governed by the configured limit, not axum's default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes));

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root(axum::extract::State(state): axum::extract::State<AppState>) -> ApiResult<Value> {
    let modules: Vec<Value> = state
        .registry
        .modules()
        .map(|m| {
            json!({
                "module": m.module_name,
                "routes": m.allowed_verbs,
            })
        })
        .collect();

    Ok(ApiResponse::success(json!({
        "name": "dynrest-api",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Header-driven REST access to registered Postgres tables",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "modules": "/api/:module (API key; GET, POST, PUT, DELETE)",
            "record": "/api/:module/:pk (API key; GET)",
        },
        "modules": modules,
    })))
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let Some(pool) = state.pool.as_ref() else {
        return ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "not configured",
        }))
        .into_response();
    };

    match DatabaseManager::health_check(pool).await {
        Ok(stats) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok",
            "pool": stats,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            ApiError::service_unavailable("Database unavailable").into_response()
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
