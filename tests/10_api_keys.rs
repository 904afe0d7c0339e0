mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::*;

#[tokio::test]
async fn missing_key_is_unauthorized() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get("/api/users", &[]).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED, "body: {}", body);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(app.executor.statements().is_empty(), "no SQL may run before the key check");
    Ok(())
}

#[tokio::test]
async fn unknown_key_is_unauthorized() -> Result<()> {
    let app = TestApp::new();

    let (status, _) = app.get("/api/users", &[("api_key", "no-such-key")]).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.executor.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn key_accepted_from_any_supported_header() -> Result<()> {
    let app = TestApp::new();

    for header in ["api_key", "api-key", "x-api-key"] {
        let (status, body) = app.get("/api/users", &[(header, READ_KEY)]).await?;
        assert_eq!(status, StatusCode::OK, "{} rejected: {}", header, body);
    }
    Ok(())
}

#[tokio::test]
async fn access_level_limits_verbs() -> Result<()> {
    let app = TestApp::new();

    // Read keys cannot write
    let (status, body) = app
        .send("DELETE", "/api/users", &[("api_key", READ_KEY), ("clause", "id=1")], None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "body: {}", body);
    assert_eq!(body["code"], "FORBIDDEN");

    // Delete keys cannot read
    let (status, _) = app.get("/api/users", &[("api_key", DELETE_KEY)]).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Update keys may write but not delete
    let update = json!({"update": {"data": {"status": "inactive"}}});
    let (status, _) = app
        .send("PUT", "/api/users", &[("api_key", UPDATE_KEY), ("clause", "id=1")], Some(update))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("DELETE", "/api/users", &[("api_key", UPDATE_KEY), ("clause", "id=1")], None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Delete keys may delete
    let (status, _) = app
        .send("DELETE", "/api/users", &[("api_key", DELETE_KEY), ("clause", "id=1")], None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    // Only the two permitted writes reached the executor
    assert_eq!(app.executor.statements().len(), 2);
    Ok(())
}

#[tokio::test]
async fn expired_key_is_deactivated_on_first_use() -> Result<()> {
    let app = TestApp::new();

    let (status, _) = app.get("/api/users", &[("api_key", EXPIRED_KEY)]).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.keys.get(EXPIRED_KEY).map(|k| k.is_active), Some(false));
    assert_eq!(app.keys.deactivations(), 1);

    // Subsequent uses are rejected as inactive without another write
    let (status, _) = app.get("/api/users", &[("api_key", EXPIRED_KEY)]).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.keys.deactivations(), 1);
    Ok(())
}

#[tokio::test]
async fn inactive_key_is_unauthorized() -> Result<()> {
    let app = TestApp::new();

    let (status, _) = app.get("/api/users", &[("api_key", INACTIVE_KEY)]).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.keys.deactivations(), 0);
    Ok(())
}
