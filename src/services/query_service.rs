use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, TtlCache};
use crate::config;
use crate::database::{ExecutorError, QueryExecutor, QueryRegistry, RegistryError, TemplateFilter};
use crate::filter::FilterData;
use crate::query::{self, Collection, NewQueryTemplate, ObjectId, QueryError, QueryTemplate};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Query '{0}' not found")]
    UnknownTemplate(String),

    #[error("Parameter validation failed")]
    Validation(Vec<String>),

    #[error("Invalid query definition: {0}")]
    Definition(#[from] QueryError),

    #[error("A query named '{0}' already exists")]
    Conflict(String),

    #[error("Registry error: {0}")]
    Registry(RegistryError),

    #[error("Query execution failed: {0}")]
    Executor(#[from] ExecutorError),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Conflict(name) => ServiceError::Conflict(name),
            RegistryError::NotFound(name) => ServiceError::UnknownTemplate(name),
            other => ServiceError::Registry(other),
        }
    }
}

/// Body of an execute call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub query_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub query_name: String,
    pub collection: Collection,
    pub count: usize,
    pub elapsed_ms: f64,
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// A substituted query that was not executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedQuery {
    pub collection: Collection,
    pub query: Value,
    pub unresolved: Vec<String>,
}

/// Template CRUD plus the validate, substitute, execute and record flow
pub struct QueryService {
    registry: Arc<dyn QueryRegistry>,
    executor: Arc<dyn QueryExecutor>,
    cache: Option<TtlCache<QueryTemplate>>,
}

impl QueryService {
    pub fn new(registry: Arc<dyn QueryRegistry>, executor: Arc<dyn QueryExecutor>) -> Self {
        let query_config = &config::config().query;
        let cache = query_config
            .enable_template_cache
            .then(|| TtlCache::new(Duration::from_secs(query_config.template_cache_ttl_secs)));
        Self {
            registry,
            executor,
            cache,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Some(TtlCache::new(ttl));
        self
    }

    /// `None` when the template cache is disabled
    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.registry.ping().await?)
    }

    /// Active templates are served from the cache when it is enabled
    pub async fn get(&self, name: &str, include_inactive: bool) -> Result<QueryTemplate, ServiceError> {
        if !include_inactive {
            if let Some(template) = self.cached(name).await {
                return Ok(template);
            }
        }

        let template = self
            .registry
            .find_by_name(name, !include_inactive)
            .await?
            .ok_or_else(|| ServiceError::UnknownTemplate(name.to_string()))?;

        if template.active {
            if let Some(cache) = &self.cache {
                cache.set(name, template.clone()).await;
            }
        }
        Ok(template)
    }

    pub async fn list(&self, filter: &TemplateFilter) -> Result<Vec<QueryTemplate>, ServiceError> {
        Ok(self.registry.list(filter).await?)
    }

    pub async fn create(
        &self,
        definition: NewQueryTemplate,
        created_by: Option<ObjectId>,
    ) -> Result<QueryTemplate, ServiceError> {
        let definition = definition.normalized();
        definition.check()?;

        let template = self.registry.create(definition.into_template(created_by)).await?;
        self.invalidate(&template.name).await;
        Ok(template)
    }

    pub async fn update(&self, name: &str, definition: NewQueryTemplate) -> Result<QueryTemplate, ServiceError> {
        let definition = definition.normalized();
        definition.check()?;

        let mut template = self.get(name, true).await?;
        definition.apply_to(&mut template);
        let saved = self.registry.save(template).await?;

        self.invalidate(name).await;
        self.invalidate(&saved.name).await;
        info!("Updated query template '{}'", saved.name);
        Ok(saved)
    }

    /// Soft delete
    pub async fn deactivate(&self, name: &str) -> Result<QueryTemplate, ServiceError> {
        self.set_active(name, false).await
    }

    pub async fn restore(&self, name: &str) -> Result<QueryTemplate, ServiceError> {
        self.set_active(name, true).await
    }

    async fn set_active(&self, name: &str, active: bool) -> Result<QueryTemplate, ServiceError> {
        let mut template = self.get(name, true).await?;
        template.active = active;
        template.updated_at = Utc::now();
        let saved = self.registry.save(template).await?;

        self.invalidate(name).await;
        info!("Query template '{}' {}", name, if active { "restored" } else { "deactivated" });
        Ok(saved)
    }

    /// Validation dry run against an active template
    pub async fn check(&self, name: &str, parameters: &Map<String, Value>) -> Result<ValidationReport, ServiceError> {
        let template = self.get(name, false).await?;
        let errors = query::validate(&template, parameters);
        Ok(ValidationReport {
            valid: errors.is_empty(),
            errors,
        })
    }

    /// Validate and substitute without executing
    pub async fn render(&self, name: &str, parameters: &Map<String, Value>) -> Result<RenderedQuery, ServiceError> {
        let template = self.get(name, false).await?;
        let concrete = prepare(&template, parameters)?;
        let unresolved = query::unresolved_placeholders(&concrete);
        Ok(RenderedQuery {
            collection: template.collection,
            query: concrete,
            unresolved,
        })
    }

    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecutionOutcome, ServiceError> {
        let template = self.get(&request.query_name, false).await?;
        let concrete = prepare(&template, &request.parameters)?;

        let filter = FilterData {
            where_clause: Some(concrete),
            order: request.order,
            limit: request.limit,
            offset: request.offset,
        };

        let started = Instant::now();
        let results = self
            .executor
            .execute(template.collection, filter)
            .await
            .map_err(|e| {
                error!("Query '{}' failed on {}: {}", template.name, template.collection, e);
                ServiceError::Executor(e)
            })?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let db_config = &config::config().database;
        if db_config.enable_slow_query_warning && elapsed_ms > db_config.slow_query_threshold_ms as f64 {
            warn!(
                "Slow query '{}': {:.1}ms (threshold {}ms)",
                template.name, elapsed_ms, db_config.slow_query_threshold_ms
            );
        }

        // Statistics are advisory; a failed write never fails the request
        if let Err(e) = self
            .registry
            .record_execution(&template.name, elapsed_ms, Utc::now())
            .await
        {
            warn!("Failed to record execution of '{}': {}", template.name, e);
        }
        self.invalidate(&template.name).await;

        debug!("Query '{}' returned {} rows in {:.1}ms", template.name, results.len(), elapsed_ms);
        Ok(ExecutionOutcome {
            query_name: template.name,
            collection: template.collection,
            count: results.len(),
            elapsed_ms,
            results,
        })
    }

    async fn cached(&self, name: &str) -> Option<QueryTemplate> {
        match &self.cache {
            Some(cache) => cache.get(name).await,
            None => None,
        }
    }

    async fn invalidate(&self, name: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(name).await;
        }
    }
}

fn prepare(template: &QueryTemplate, parameters: &Map<String, Value>) -> Result<Value, ServiceError> {
    let errors = query::validate(template, parameters);
    if !errors.is_empty() {
        debug!("Query '{}' rejected parameters: {:?}", template.name, errors);
        return Err(ServiceError::Validation(errors));
    }

    let concrete = query::substitute(template, parameters);
    let unresolved = query::unresolved_placeholders(&concrete);
    if !unresolved.is_empty() {
        warn!(
            "Query '{}' has unresolved placeholders: {}",
            template.name,
            unresolved.join(", ")
        );
    }
    Ok(concrete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryQueryRegistry;
    use crate::query::{ParameterSchema, ParameterType, ParameterValidation};
    use crate::testing::{find_by_uni, find_by_uni_definition, params, RecordingExecutor};
    use serde_json::json;

    fn service_with(
        templates: Vec<QueryTemplate>,
        executor: RecordingExecutor,
    ) -> (QueryService, Arc<InMemoryQueryRegistry>, Arc<RecordingExecutor>) {
        let registry = Arc::new(InMemoryQueryRegistry::with_templates(templates));
        let executor = Arc::new(executor);
        let service = QueryService::new(registry.clone(), executor.clone());
        (service, registry, executor)
    }

    fn execute_request(name: &str, parameters: Value) -> ExecuteRequest {
        ExecuteRequest {
            query_name: name.to_string(),
            parameters: params(parameters),
            limit: None,
            offset: None,
            order: None,
        }
    }

    #[tokio::test]
    async fn execute_substitutes_runs_and_records() {
        let rows = vec![json!({"email": "a@colombo.lk"}), json!({"email": "b@colombo.lk"})];
        let (service, registry, executor) = service_with(vec![find_by_uni()], RecordingExecutor::returning(rows));

        let outcome = service
            .execute(execute_request("findByUni", json!({"uni": "Colombo"})))
            .await
            .unwrap();
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.collection, Collection::Users);

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Collection::Users);
        assert_eq!(
            calls[0].1.where_clause,
            Some(json!({"university": "Colombo", "active": true}))
        );

        let stored = registry.find_by_name("findByUni", true).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 1);
        assert!(stored.last_executed.is_some());
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_the_executor() {
        let (service, registry, executor) = service_with(vec![find_by_uni()], RecordingExecutor::default());

        let err = service
            .execute(execute_request("findByUni", json!({})))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors, vec!["Required parameter 'uni' is missing".to_string()])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(executor.calls().is_empty());

        let stored = registry.find_by_name("findByUni", true).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 0);
    }

    #[tokio::test]
    async fn executor_failure_is_not_recorded() {
        let (service, registry, _) = service_with(vec![find_by_uni()], RecordingExecutor::failing());

        let err = service
            .execute(execute_request("findByUni", json!({"uni": "Colombo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Executor(_)));

        let stored = registry.find_by_name("findByUni", true).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 0);
        assert_eq!(stored.last_executed, None);
    }

    #[tokio::test]
    async fn unknown_and_inactive_templates_are_not_found() {
        let mut inactive = find_by_uni();
        inactive.active = false;
        let (service, _, executor) = service_with(vec![inactive], RecordingExecutor::default());

        let err = service
            .execute(execute_request("findByUni", json!({"uni": "Colombo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownTemplate(name) if name == "findByUni"));
        assert!(matches!(
            service.get("nope", true).await,
            Err(ServiceError::UnknownTemplate(_))
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn numeric_strings_reach_the_executor_as_numbers() {
        let template = crate::testing::template_with_query(
            vec![ParameterSchema::new("age", ParameterType::Number).with_validation(ParameterValidation {
                min: Some(13.0),
                max: Some(120.0),
                ..Default::default()
            })],
            json!({"age": {"$gte": "{{age}}"}}),
        );
        let (service, _, executor) = service_with(vec![template], RecordingExecutor::default());

        service
            .execute(execute_request("findByUni", json!({"age": "42"})))
            .await
            .unwrap();
        assert_eq!(executor.calls()[0].1.where_clause, Some(json!({"age": {"$gte": 42}})));

        let err = service
            .execute(execute_request("findByUni", json!({"age": 200})))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Validation(errors) if errors == vec!["Parameter 'age' must be at most 120".to_string()])
        );
    }

    #[tokio::test]
    async fn paging_and_order_are_passed_through() {
        let (service, _, executor) = service_with(vec![find_by_uni()], RecordingExecutor::default());
        let mut request = execute_request("findByUni", json!({"uni": "Colombo"}));
        request.limit = Some(5);
        request.offset = Some(10);
        request.order = Some(json!("created_at desc"));

        service.execute(request).await.unwrap();
        let filter = &executor.calls()[0].1;
        assert_eq!(filter.limit, Some(5));
        assert_eq!(filter.offset, Some(10));
        assert_eq!(filter.order, Some(json!("created_at desc")));
    }

    #[tokio::test]
    async fn create_checks_definition_and_uniqueness() {
        let (service, _, _) = service_with(vec![], RecordingExecutor::default());
        let owner = ObjectId::new();

        let created = service.create(find_by_uni_definition(), Some(owner)).await.unwrap();
        assert_eq!(created.created_by, Some(owner));
        assert_eq!(created.execution_count, 0);

        assert!(matches!(
            service.create(find_by_uni_definition(), None).await,
            Err(ServiceError::Conflict(_))
        ));

        let mut bad = find_by_uni_definition();
        bad.name = "other".into();
        bad.query = json!({"university": "{{university}}"});
        assert!(matches!(
            service.create(bad, None).await,
            Err(ServiceError::Definition(QueryError::UndeclaredPlaceholder(_)))
        ));
    }

    #[tokio::test]
    async fn deactivate_and_restore() {
        let (service, _, _) = service_with(vec![find_by_uni()], RecordingExecutor::default());

        let deactivated = service.deactivate("findByUni").await.unwrap();
        assert!(!deactivated.active);
        assert!(matches!(
            service.get("findByUni", false).await,
            Err(ServiceError::UnknownTemplate(_))
        ));
        assert!(service.get("findByUni", true).await.is_ok());

        service.restore("findByUni").await.unwrap();
        assert!(service.get("findByUni", false).await.unwrap().active);
    }

    #[tokio::test]
    async fn cached_templates_are_invalidated_on_mutation() {
        let (service, _, _) = service_with(vec![find_by_uni()], RecordingExecutor::default());
        let service = service.with_cache_ttl(Duration::from_secs(60));

        assert!(service.get("findByUni", false).await.is_ok());
        service.deactivate("findByUni").await.unwrap();
        assert!(matches!(
            service.get("findByUni", false).await,
            Err(ServiceError::UnknownTemplate(_))
        ));
    }

    #[tokio::test]
    async fn cache_stats_count_hits_and_misses() {
        let (service, _, _) = service_with(vec![find_by_uni()], RecordingExecutor::default());
        let service = service.with_cache_ttl(Duration::from_secs(60));

        service.get("findByUni", false).await.unwrap();
        service.get("findByUni", false).await.unwrap();

        let stats = service.cache_stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn update_replaces_definition() {
        let (service, _, _) = service_with(vec![find_by_uni()], RecordingExecutor::default());

        let mut definition = find_by_uni_definition();
        definition.name = "usersByUniversity".into();
        definition.tags = vec!["Students".into()];
        let updated = service.update("findByUni", definition).await.unwrap();

        assert_eq!(updated.name, "usersByUniversity");
        assert_eq!(updated.tags, vec!["students"]);
        assert!(service.get("findByUni", true).await.is_err());
    }

    #[tokio::test]
    async fn render_reports_unresolved_placeholders() {
        let template = crate::testing::template_with_query(
            vec![
                ParameterSchema::new("uni", ParameterType::String).required(),
                ParameterSchema::new("faculty", ParameterType::String),
            ],
            json!({"university": "{{uni}}", "faculty": "{{faculty}}"}),
        );
        let (service, _, executor) = service_with(vec![template], RecordingExecutor::default());

        let rendered = service
            .render("findByUni", &params(json!({"uni": "Colombo"})))
            .await
            .unwrap();
        assert_eq!(rendered.query, json!({"university": "Colombo", "faculty": "{{faculty}}"}));
        assert_eq!(rendered.unresolved, vec!["faculty".to_string()]);
        assert!(executor.calls().is_empty());

        let report = service.check("findByUni", &params(json!({"bogus": 1}))).await.unwrap();
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "Required parameter 'uni' is missing".to_string(),
                "Unknown parameter 'bogus'".to_string()
            ]
        );
    }
}
