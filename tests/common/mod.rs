#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use campus_api::app::{router, AppState};
use campus_api::auth::{generate_jwt, Claims, ADMIN_ROLE};
use campus_api::database::{ExecutorError, InMemoryQueryRegistry, QueryExecutor};
use campus_api::filter::FilterData;
use campus_api::query::{Collection, NewQueryTemplate, QueryTemplate};
use campus_api::services::QueryService;

pub const ADMIN_ID: &str = "64b7f0c2a1e4d3b2c1a09f8e";
pub const STUDENT_ID: &str = "64b7f0c2a1e4d3b2c1a09f8f";

/// Executor double: canned rows, remembers every call
#[derive(Default)]
pub struct StubExecutor {
    rows: Vec<Value>,
    calls: Mutex<Vec<(Collection, FilterData)>>,
}

impl StubExecutor {
    pub fn calls(&self) -> Vec<(Collection, FilterData)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn execute(&self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, ExecutorError> {
        self.calls.lock().unwrap().push((collection, filter));
        Ok(self.rows.clone())
    }
}

/// An app served on an ephemeral port for the life of one test
pub struct TestServer {
    pub base_url: String,
    pub registry: Arc<InMemoryQueryRegistry>,
    pub executor: Arc<StubExecutor>,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn(templates: Vec<QueryTemplate>, rows: Vec<Value>) -> Result<Self> {
        let registry = Arc::new(InMemoryQueryRegistry::with_templates(templates));
        let executor = Arc::new(StubExecutor {
            rows,
            ..Default::default()
        });
        let service = QueryService::new(registry.clone(), executor.clone());
        let app = router(AppState::new(service));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind test listener")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            registry,
            executor,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub fn anonymous(&self) -> &reqwest::Client {
        &self.client
    }
}

pub fn admin_token() -> String {
    token(ADMIN_ID, "registrar@campus.lk", ADMIN_ROLE)
}

pub fn student_token() -> String {
    token(STUDENT_ID, "student@campus.lk", "student")
}

pub fn token(sub: &str, email: &str, role: &str) -> String {
    generate_jwt(&Claims::new(sub, email, role)).expect("failed to mint test token")
}

pub fn faculties_by_uni_definition() -> NewQueryTemplate {
    serde_json::from_value(json!({
        "name": "facultiesByUni",
        "description": "Faculties of one university",
        "collection": "faculties",
        "category": "search",
        "tags": ["faculty"],
        "query": {"uni_id": "{{uni}}", "students": {"$gte": "{{minStudents}}"}},
        "parameters": [
            {"name": "uni", "type": "objectId", "required": true},
            {"name": "minStudents", "type": "number", "validation": {"min": 0, "max": 50000}}
        ]
    }))
    .expect("fixture definition")
}

pub fn faculties_by_uni() -> QueryTemplate {
    faculties_by_uni_definition().into_template(None)
}

pub async fn json_body(response: reqwest::Response) -> Result<Value> {
    response.json::<Value>().await.context("response was not JSON")
}
