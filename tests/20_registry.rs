mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::*;

#[tokio::test]
async fn unknown_module_is_not_found() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get("/api/widgets", &[("api_key", READ_KEY)]).await?;

    assert_eq!(status, StatusCode::NOT_FOUND, "body: {}", body);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn unknown_module_is_reported_before_the_key() -> Result<()> {
    let app = TestApp::new();

    let (status, _) = app.get("/api/widgets", &[]).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn module_names_are_case_insensitive() -> Result<()> {
    let app = TestApp::new();

    let (status, _) = app.get("/api/Users", &[("api_key", READ_KEY)]).await?;

    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn disabled_verb_is_method_not_allowed() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .send("DELETE", "/api/messages", &[("api_key", DELETE_KEY), ("clause", "id=1")], None)
        .await?;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "body: {}", body);
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
    assert!(app.executor.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn registered_module_without_table_is_not_found() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get("/api/ghosts", &[("api_key", READ_KEY)]).await?;

    assert_eq!(status, StatusCode::NOT_FOUND, "body: {}", body);
    assert!(body["error"].as_str().unwrap_or_default().contains("ghosts"));
    Ok(())
}

#[tokio::test]
async fn schema_is_introspected_once_when_cached() -> Result<()> {
    let app = TestApp::new();

    for _ in 0..3 {
        let (status, _) = app.get("/api/users", &[("api_key", READ_KEY)]).await?;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.catalog.describe_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn unmatched_route_uses_failure_envelope() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get("/nowhere", &[]).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    Ok(())
}
