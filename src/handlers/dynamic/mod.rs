pub mod request;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::{DataOperation, DynamicRepository, TableSchema};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::{Columns, QueryError, SearchRequest};
use crate::registry::ModuleMetadata;
use crate::server::AppState;
use crate::types::Verb;

pub use request::{DynamicRequest, InsertRow, Limit, SearchSpec};

/// GET|POST|PUT|DELETE /api/:module
pub async fn module_request(
    State(state): State<AppState>,
    Path(module): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let verb = Verb::try_from(&method).map_err(ApiError::bad_request)?;
    let body = parse_body(&body)?;

    let result = handle(&state, &module, verb, &headers, body.as_ref()).await;
    let (rows, formatted) = reject(&module, verb, result)?;
    let data = shape(&state, rows, formatted);
    if verb == Verb::Post {
        Ok(ApiResponse::created(data))
    } else {
        Ok(ApiResponse::success(data))
    }
}

/// GET /api/:module/:pk
pub async fn record_request(
    State(state): State<AppState>,
    Path((module, pk)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let result = async {
        let (metadata, schema) = authorize(&state, &module, Verb::Get, &headers).await?;
        let formatted = DynamicRequest::parse(Verb::Get, &headers, None)?.formatted_json;
        let repository = DynamicRepository::new(schema, state.executor.clone());
        let record = repository.get_record_by_pk(&pk).await;
        let record = invalidate_on_stale(&state, metadata, record).await?;
        Ok::<_, QueryError>((vec![record], formatted))
    }
    .await;
    let (rows, formatted) = reject(&module, Verb::Get, result)?;
    Ok(ApiResponse::success(shape(&state, rows, formatted)))
}

/// Registry lookup, then the key gate, then the module's verb list, then the schema
async fn authorize(
    state: &AppState,
    module: &str,
    verb: Verb,
    headers: &HeaderMap,
) -> Result<(ModuleMetadata, Arc<TableSchema>), QueryError> {
    let metadata = state.registry.lookup_by_module(module)?.clone();

    let key = DynamicRequest::api_key(headers).ok_or_else(|| QueryError::Auth("Missing API key".to_string()))?;
    state.gate.validate(&key, verb).await?;

    if !metadata.allows(verb) {
        return Err(QueryError::VerbDisabled {
            verb: verb.to_string(),
            module: metadata.module_name.clone(),
        });
    }

    let schema = state.schemas.load(&metadata.schema_name).await?;
    Ok((metadata, schema))
}

async fn handle(
    state: &AppState,
    module: &str,
    verb: Verb,
    headers: &HeaderMap,
    body: Option<&Value>,
) -> Result<(Vec<Value>, bool), QueryError> {
    let (metadata, schema) = authorize(state, module, verb, headers).await?;
    let request = DynamicRequest::parse(verb, headers, body)?;
    debug!("{} {} parsed: {:?}", verb, metadata.module_name, request);

    let repository = DynamicRepository::new(schema, state.executor.clone());
    let config = &state.config;
    let formatted = request.formatted_json;

    let rows = match (verb, request.search) {
        (Verb::Get, Some(search)) => {
            let limit = match request.limit {
                Limit::Default => Some(config.query.default_search_limit),
                Limit::Unbounded => None,
                Limit::Rows(n) => Some(n),
            };
            let search_columns = match search.columns {
                Columns::Named(names) => names,
                Columns::All => repository.schema().column_names().into_iter().map(str::to_string).collect(),
            };
            let search = SearchRequest {
                query: search.query,
                search_columns,
                result_columns: request.columns,
                limit: config.cap_limit(limit),
            };
            repository.search(&search).await
        }
        (Verb::Get, None) => {
            let limit = match request.limit {
                Limit::Default | Limit::Unbounded => None,
                Limit::Rows(n) => Some(n),
            };
            repository
                .get_schema_data(request.columns, request.where_clause, request.order_by, config.cap_limit(limit))
                .await
        }
        (verb, _) => {
            let mut op = DataOperation::new(verb);
            op.where_clause = request.where_clause;
            op.set = request.set;
            if let Some(row) = request.insert {
                op.columns = Columns::Named(row.columns);
                op.values = row.values;
            }
            repository.custom_data_operation(op).await
        }
    };

    let rows = invalidate_on_stale(state, metadata, rows).await?;
    Ok((rows, formatted))
}

/// Drop the cached schema when the database reports a column or table we believed existed
async fn invalidate_on_stale<T>(
    state: &AppState,
    metadata: ModuleMetadata,
    result: Result<T, QueryError>,
) -> Result<T, QueryError> {
    let stale = matches!(&result, Err(QueryError::Database(e)) if e.is_undefined_object());
    if stale {
        state.schemas.invalidate(&metadata.schema_name).await;
    }
    result
}

fn reject<T>(module: &str, verb: Verb, result: Result<T, QueryError>) -> Result<T, ApiError> {
    result.map_err(|e| {
        warn!("{} /api/{} rejected: {}", verb, module, e);
        ApiError::from(e)
    })
}

/// Always an array unless the legacy single-row collapse is on; `formattedJSON` serializes it
fn shape(state: &AppState, mut rows: Vec<Value>, formatted: bool) -> Value {
    let data = if state.config.query.collapse_single_row && rows.len() == 1 {
        rows.remove(0)
    } else {
        Value::Array(rows)
    };
    if formatted {
        Value::String(data.to_string())
    } else {
        data
    }
}

fn parse_body(body: &Bytes) -> Result<Option<Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))
}
