use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::registry::{QueryRegistry, RegistryError, TemplateFilter};
use crate::query::{self, QueryTemplate};

/// Registry held in process memory. Statistics updates run under the write lock.
#[derive(Default)]
pub struct InMemoryQueryRegistry {
    templates: RwLock<HashMap<String, QueryTemplate>>,
}

impl InMemoryQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries with a duplicate name replace earlier ones
    pub fn with_templates(templates: impl IntoIterator<Item = QueryTemplate>) -> Self {
        let templates = templates.into_iter().map(|t| (t.name.clone(), t)).collect();
        Self {
            templates: RwLock::new(templates),
        }
    }

    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }
}

#[async_trait]
impl QueryRegistry for InMemoryQueryRegistry {
    async fn find_by_name(&self, name: &str, active_only: bool) -> Result<Option<QueryTemplate>, RegistryError> {
        let templates = self.templates.read().await;
        Ok(templates
            .get(name)
            .filter(|t| t.active || !active_only)
            .cloned())
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<QueryTemplate>, RegistryError> {
        let templates = self.templates.read().await;
        let mut found: Vec<QueryTemplate> = templates.values().filter(|t| filter.matches(t)).cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn create(&self, template: QueryTemplate) -> Result<QueryTemplate, RegistryError> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(&template.name) {
            return Err(RegistryError::Conflict(template.name));
        }
        templates.insert(template.name.clone(), template.clone());
        Ok(template)
    }

    async fn save(&self, template: QueryTemplate) -> Result<QueryTemplate, RegistryError> {
        let mut templates = self.templates.write().await;

        let previous_name = templates
            .values()
            .find(|t| t.id == template.id)
            .map(|t| t.name.clone())
            .ok_or_else(|| RegistryError::NotFound(template.name.clone()))?;

        if previous_name != template.name && templates.contains_key(&template.name) {
            return Err(RegistryError::Conflict(template.name));
        }

        let Some(stored) = templates.remove(&previous_name) else {
            return Err(RegistryError::NotFound(previous_name));
        };

        // Statistics are owned by record_execution and never overwritten here
        let mut saved = template;
        saved.execution_count = stored.execution_count;
        saved.last_executed = stored.last_executed;
        saved.average_execution_time = stored.average_execution_time;

        templates.insert(saved.name.clone(), saved.clone());
        Ok(saved)
    }

    async fn record_execution(&self, name: &str, elapsed_ms: f64, at: DateTime<Utc>) -> Result<(), RegistryError> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        query::record_execution(template, elapsed_ms, at);
        Ok(())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::find_by_uni;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_rejects_duplicate_names() {
        let registry = InMemoryQueryRegistry::new();
        registry.create(find_by_uni()).await.unwrap();

        let err = registry.create(find_by_uni()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(name) if name == "findByUni"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn inactive_templates_are_hidden_from_active_lookups() {
        let mut template = find_by_uni();
        template.active = false;
        let registry = InMemoryQueryRegistry::with_templates([template]);

        assert!(registry.find_by_name("findByUni", true).await.unwrap().is_none());
        assert!(registry.find_by_name("findByUni", false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_renames_and_keeps_statistics() {
        let registry = InMemoryQueryRegistry::with_templates([find_by_uni()]);
        registry.record_execution("findByUni", 40.0, Utc::now()).await.unwrap();

        let mut edited = registry.find_by_name("findByUni", true).await.unwrap().unwrap();
        edited.name = "usersByUniversity".into();
        edited.execution_count = 0;
        let saved = registry.save(edited).await.unwrap();

        assert_eq!(saved.execution_count, 1);
        assert_eq!(saved.average_execution_time, 40.0);
        assert!(registry.find_by_name("findByUni", false).await.unwrap().is_none());
        assert!(registry.find_by_name("usersByUniversity", true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_rejects_rename_onto_existing_name() {
        let mut other = find_by_uni();
        other.id = crate::query::ObjectId::new();
        other.name = "other".into();
        let registry = InMemoryQueryRegistry::with_templates([find_by_uni(), other.clone()]);

        other.name = "findByUni".into();
        assert!(matches!(registry.save(other).await, Err(RegistryError::Conflict(_))));
    }

    #[tokio::test]
    async fn concurrent_recording_loses_no_updates() {
        let registry = Arc::new(InMemoryQueryRegistry::with_templates([find_by_uni()]));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.record_execution("findByUni", 10.0, Utc::now()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let template = registry.find_by_name("findByUni", true).await.unwrap().unwrap();
        assert_eq!(template.execution_count, 50);
        assert_eq!(template.average_execution_time, 10.0);
    }

    #[tokio::test]
    async fn recording_unknown_template_is_not_found() {
        let registry = InMemoryQueryRegistry::new();
        let err = registry.record_execution("missing", 1.0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }
}
