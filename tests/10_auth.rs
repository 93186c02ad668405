mod common;

use anyhow::Result;
use reqwest::StatusCode;

use common::{json_body, student_token, TestServer};

#[tokio::test]
async fn health_endpoint_is_public() -> Result<()> {
    let server = TestServer::spawn(vec![], vec![]).await?;

    let res = server.anonymous().get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    // null when the template cache is disabled, counters otherwise
    assert!(body["data"].get("cache").is_some());
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = TestServer::spawn(vec![], vec![]).await?;

    let body = json_body(server.anonymous().get(server.url("/")).send().await?).await?;
    assert_eq!(body["data"]["name"], "Campus API");
    assert!(body["data"]["endpoints"]["execute"].is_string());
    Ok(())
}

#[tokio::test]
async fn query_routes_require_a_bearer_token() -> Result<()> {
    let server = TestServer::spawn(vec![], vec![]).await?;

    let res = server.anonymous().get(server.url("/api/queries")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn garbage_tokens_are_rejected() -> Result<()> {
    let server = TestServer::spawn(vec![], vec![]).await?;

    let res = server.get("/api/queries", "not.a.jwt").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn valid_tokens_reach_the_handlers() -> Result<()> {
    let server = TestServer::spawn(vec![], vec![]).await?;

    let res = server.get("/api/queries", &student_token()).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await?;
    assert_eq!(body["data"], serde_json::json!([]));
    Ok(())
}
