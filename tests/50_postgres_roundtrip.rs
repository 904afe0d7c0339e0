//! Round-trips against a real server; each test skips itself when DATABASE_URL is unset.

mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use dynrest_api::auth::{AccessLevel, PgApiKeyStore};
use dynrest_api::database::{DataOperation, DynamicRepository, PgExecutor, SchemaCache};
use dynrest_api::query::{Assignment, Columns, CompareOp, OrderBy, Predicate, SearchRequest, SortDirection, SqlValue};
use dynrest_api::registry::{ModuleMetadata, ModuleRegistry};
use dynrest_api::server::{app, AppState};
use dynrest_api::services::ApiKeyService;
use dynrest_api::testing::TestContext;
use dynrest_api::types::Verb;

const PEOPLE_DDL: &str = "id SERIAL PRIMARY KEY, username TEXT NOT NULL, age INT4, joined DATE";

async fn repository(ctx: &TestContext, table: &str) -> Result<DynamicRepository> {
    let executor = Arc::new(PgExecutor::new(ctx.pool().clone(), common::test_config().database));
    let schema = SchemaCache::new(executor.clone(), false).load(table).await?;
    Ok(DynamicRepository::new(schema, executor))
}

async fn insert(repo: &DynamicRepository, username: &str, age: i64) -> Result<serde_json::Value> {
    let mut op = DataOperation::new(Verb::Post);
    op.columns = Columns::named(["username", "age"]);
    op.values = vec![SqlValue::from(username), SqlValue::Int(age)];
    let mut rows = repo.custom_data_operation(op).await?;
    Ok(rows.remove(0))
}

#[tokio::test]
async fn insert_then_fetch_by_primary_key() -> Result<()> {
    let Some(mut ctx) = TestContext::connect().await? else {
        return Ok(());
    };
    let table = ctx.create_table("people", PEOPLE_DDL).await?;
    let repo = repository(&ctx, &table).await?;

    let created = insert(&repo, "ada", 36).await?;
    let id = created["id"].as_i64().expect("serial id");

    let fetched = repo.get_record_by_pk(&id.to_string()).await?;
    assert_eq!(fetched["username"], "ada");
    assert_eq!(fetched["age"], 36);
    assert!(fetched["joined"].is_null());

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn json_rows_keep_the_statement_order() -> Result<()> {
    let Some(mut ctx) = TestContext::connect().await? else {
        return Ok(());
    };
    let table = ctx.create_table("people", PEOPLE_DDL).await?;
    let repo = repository(&ctx, &table).await?;

    for (name, age) in [("c", 30), ("a", 50), ("d", 20), ("b", 40)] {
        insert(&repo, name, age).await?;
    }

    let order = OrderBy {
        column: "age".into(),
        direction: SortDirection::Desc,
    };
    let rows = repo
        .get_schema_data(Columns::named(["username"]), vec![], Some(order), Some(3))
        .await?;
    let names: Vec<_> = rows.iter().map(|r| r["username"].as_str().unwrap_or_default()).collect();
    assert_eq!(names, ["a", "b", "c"]);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn search_orders_prefix_matches_first() -> Result<()> {
    let Some(mut ctx) = TestContext::connect().await? else {
        return Ok(());
    };
    let table = ctx.create_table("people", PEOPLE_DDL).await?;
    let repo = repository(&ctx, &table).await?;

    for name in ["bojo", "john", "joanna", "mary"] {
        insert(&repo, name, 30).await?;
    }

    let rows = repo
        .search(&SearchRequest {
            query: "jo".into(),
            search_columns: vec!["username".into()],
            result_columns: Columns::All,
            limit: Some(10),
        })
        .await?;
    let names: Vec<_> = rows.iter().map(|r| r["username"].as_str().unwrap_or_default()).collect();
    assert_eq!(names, ["john", "joanna", "bojo"]);

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn wildcards_in_search_terms_are_literal() -> Result<()> {
    let Some(mut ctx) = TestContext::connect().await? else {
        return Ok(());
    };
    let table = ctx.create_table("people", PEOPLE_DDL).await?;
    let repo = repository(&ctx, &table).await?;

    insert(&repo, "100%_sure", 1).await?;
    insert(&repo, "100 sure", 2).await?;

    let rows = repo
        .search(&SearchRequest {
            query: "100%_".into(),
            search_columns: vec!["username".into()],
            result_columns: Columns::All,
            limit: None,
        })
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["username"], "100%_sure");

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn enum_inet_and_interval_columns_bind_through_casts() -> Result<()> {
    let Some(mut ctx) = TestContext::connect().await? else {
        return Ok(());
    };
    let mood = ctx.create_enum("mood", &["happy", "sad"]).await?;
    let ddl = format!("id SERIAL PRIMARY KEY, mood \"{}\", ip INET, uptime INTERVAL", mood);
    let table = ctx.create_table("hosts", &ddl).await?;
    let repo = repository(&ctx, &table).await?;

    let mut op = DataOperation::new(Verb::Post);
    op.columns = Columns::named(["mood", "ip", "uptime"]);
    op.values = vec!["happy".into(), "10.0.0.1".into(), "2 hours".into()];
    let created = repo.custom_data_operation(op).await?;
    assert_eq!(created[0]["mood"], "happy");
    assert_eq!(created[0]["ip"], "10.0.0.1");
    assert_eq!(created[0]["uptime"], "02:00:00");

    let rows = repo
        .get_schema_data(
            Columns::All,
            vec![Predicate::new("ip", CompareOp::Eq, "10.0.0.1".into())],
            None,
            None,
        )
        .await?;
    assert_eq!(rows.len(), 1);

    let mut op = DataOperation::new(Verb::Put);
    op.where_clause = vec![Predicate::new("mood", CompareOp::Eq, "happy".into())];
    op.set = vec![Assignment::new("mood", "sad".into()), Assignment::new("ip", "::1".into())];
    let updated = repo.custom_data_operation(op).await?;
    assert_eq!(updated[0]["mood"], "sad");
    assert_eq!(updated[0]["ip"], "::1");

    let mut op = DataOperation::new(Verb::Post);
    op.columns = Columns::named(["mood"]);
    op.values = vec!["furious".into()];
    assert!(repo.custom_data_operation(op).await.is_err());

    ctx.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn api_round_trip_through_the_router() -> Result<()> {
    let Some(mut ctx) = TestContext::connect().await? else {
        return Ok(());
    };
    let table = ctx.create_table("people", PEOPLE_DDL).await?;

    let store = Arc::new(PgApiKeyStore::new(ctx.pool().clone()));
    store.ensure_table().await?;
    let service = ApiKeyService::new(store);
    let key = service
        .generate(Some("roundtrip".into()), Utc::now() + Duration::days(1), AccessLevel::ReadUpdate, true)
        .await?;

    let registry = ModuleRegistry::from_modules([ModuleMetadata::new("people", &table, &[Verb::Get, Verb::Post])])?;
    let router = app(AppState::postgres(ctx.pool().clone(), registry, common::test_config()));
    let harness = common::TestApp::from_router(router);

    let (status, body) = harness
        .send("POST", "/api/people", &[("api_key", key.key.as_str())], Some(json!({"push": {"username": "grace", "age": 85}})))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);

    let (status, body) = harness
        .get("/api/people", &[("api_key", key.key.as_str()), ("clause", "age>80"), ("fields", "username")])
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"], json!([{"username": "grace"}]));

    let (status, _) = harness.get("/health", &[]).await?;
    assert_eq!(status, StatusCode::OK);

    service.delete(key.id).await?;
    ctx.cleanup().await?;
    Ok(())
}
