//! Template fixtures and a recording executor for unit tests

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Mutex;

use crate::database::executor::{ExecutorError, QueryExecutor};
use crate::filter::FilterData;
use crate::query::{Collection, NewQueryTemplate, ParameterSchema, ParameterType, QueryTemplate};

pub fn find_by_uni_definition() -> NewQueryTemplate {
    NewQueryTemplate {
        name: "findByUni".to_string(),
        description: Some("Active users of a university".to_string()),
        collection: Collection::Users,
        query: json!({"university": "{{uni}}", "active": true}),
        parameters: vec![ParameterSchema::new("uni", ParameterType::String).required()],
        category: Default::default(),
        tags: vec!["users".to_string()],
        active: None,
    }
}

pub fn find_by_uni() -> QueryTemplate {
    find_by_uni_definition().into_template(None)
}

pub fn template_with(parameters: Vec<ParameterSchema>) -> QueryTemplate {
    let mut template = find_by_uni();
    template.parameters = parameters;
    template
}

pub fn template_with_query(parameters: Vec<ParameterSchema>, query: Value) -> QueryTemplate {
    let mut template = template_with(parameters);
    template.query = query;
    template
}

pub fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Returns canned rows (or a failure) and remembers what it was asked to run
#[derive(Default)]
pub struct RecordingExecutor {
    pub rows: Vec<Value>,
    pub fail: bool,
    pub calls: Mutex<Vec<(Collection, FilterData)>>,
}

impl RecordingExecutor {
    pub fn returning(rows: Vec<Value>) -> Self {
        Self { rows, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn calls(&self) -> Vec<(Collection, FilterData)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, collection: Collection, filter: FilterData) -> Result<Vec<Value>, ExecutorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((collection, filter));
        }
        if self.fail {
            return Err(ExecutorError::Timeout(0));
        }
        Ok(self.rows.clone())
    }
}
