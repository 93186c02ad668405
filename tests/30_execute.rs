mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use campus_api::query::Collection;
use common::{faculties_by_uni, json_body, student_token, TestServer};

const UNI: &str = "507f1f77bcf86cd799439011";

fn faculty_rows() -> Vec<serde_json::Value> {
    vec![
        json!({"name": "Engineering", "students": 4200}),
        json!({"name": "Medicine", "students": 1800}),
    ]
}

#[tokio::test]
async fn executes_with_substituted_parameters() -> Result<()> {
    let server = TestServer::spawn(vec![faculties_by_uni()], faculty_rows()).await?;

    let res = server
        .post("/api/queries/execute", &student_token())
        .json(&json!({
            "queryName": "facultiesByUni",
            "parameters": {"uni": UNI, "minStudents": "1000"},
            "limit": 10
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await?;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["collection"], "faculties");
    assert_eq!(body["data"]["results"][0]["name"], "Engineering");

    let calls = server.executor.calls();
    assert_eq!(calls.len(), 1);
    let (collection, filter) = &calls[0];
    assert_eq!(*collection, Collection::Faculties);
    assert_eq!(
        filter.where_clause,
        Some(json!({"uni_id": UNI, "students": {"$gte": 1000}}))
    );
    assert_eq!(filter.limit, Some(10));
    Ok(())
}

#[tokio::test]
async fn execution_statistics_accumulate() -> Result<()> {
    let server = TestServer::spawn(vec![faculties_by_uni()], faculty_rows()).await?;
    let token = student_token();

    for _ in 0..3 {
        let res = server
            .post("/api/queries/execute", &token)
            .json(&json!({"queryName": "facultiesByUni", "parameters": {"uni": UNI}}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let body = json_body(server.get("/api/queries/facultiesByUni", &token).send().await?).await?;
    assert_eq!(body["data"]["executionCount"], 3);
    assert!(body["data"]["lastExecuted"].is_string());
    Ok(())
}

#[tokio::test]
async fn parameter_errors_are_reported_together() -> Result<()> {
    let server = TestServer::spawn(vec![faculties_by_uni()], faculty_rows()).await?;

    let res = server
        .post("/api/queries/execute", &student_token())
        .json(&json!({
            "queryName": "facultiesByUni",
            "parameters": {"minStudents": 90000, "extra": 1}
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = json_body(res).await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let errors: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_str())
        .collect();
    assert!(errors.contains(&"Required parameter 'uni' is missing"));
    assert!(errors.contains(&"Unknown parameter 'extra'"));
    assert!(errors.contains(&"Parameter 'minStudents' must be at most 50000"));
    assert!(server.executor.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_templates_are_not_found() -> Result<()> {
    let server = TestServer::spawn(vec![], vec![]).await?;

    let res = server
        .post("/api/queries/execute", &student_token())
        .json(&json!({"queryName": "missing", "parameters": {}}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn validate_is_a_dry_run() -> Result<()> {
    let server = TestServer::spawn(vec![faculties_by_uni()], faculty_rows()).await?;
    let token = student_token();

    let body = json_body(
        server
            .post("/api/queries/facultiesByUni/validate", &token)
            .json(&json!({"parameters": {"uni": "not-an-id"}}))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["errors"], json!(["Parameter 'uni' must be a valid ObjectId"]));

    let body = json_body(
        server
            .post("/api/queries/facultiesByUni/validate", &token)
            .json(&json!({"parameters": {"uni": UNI}}))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(body["data"]["valid"], true);
    assert!(server.executor.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn render_reports_unresolved_placeholders() -> Result<()> {
    let server = TestServer::spawn(vec![faculties_by_uni()], faculty_rows()).await?;

    let body = json_body(
        server
            .post("/api/queries/facultiesByUni/render", &student_token())
            .json(&json!({"parameters": {"uni": UNI}}))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(body["data"]["collection"], "faculties");
    assert_eq!(
        body["data"]["query"],
        json!({"uni_id": UNI, "students": {"$gte": "{{minStudents}}"}})
    );
    assert_eq!(body["data"]["unresolved"], json!(["minStudents"]));
    assert!(server.executor.calls().is_empty());
    Ok(())
}
