use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::error::QueryError;
use super::substitute::placeholders;
use super::types::{Collection, ParameterSchema, ParameterType, QueryCategory, QueryTemplate};
use super::value::{ObjectId, ParamValue};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

/// Static segments under `/api/queries/` that a name would collide with
const RESERVED_NAMES: [&str; 1] = ["execute"];

/// Create/update payload for a template. Statistics and ownership are not client-settable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQueryTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub collection: Collection,
    pub query: Value,
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,
    #[serde(default)]
    pub category: QueryCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl NewQueryTemplate {
    /// Trim the name; lowercase, trim, sort and dedup tags
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        self.tags = tags;
        self
    }

    pub fn check(&self) -> Result<(), QueryError> {
        let name_len = self.name.trim().chars().count();
        if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_len) {
            return Err(QueryError::InvalidName);
        }
        if RESERVED_NAMES.contains(&self.name.trim()) {
            return Err(QueryError::ReservedName(self.name.trim().to_string()));
        }
        if !self.query.is_object() {
            return Err(QueryError::InvalidQueryDocument);
        }

        let mut seen = HashSet::new();
        for (position, schema) in self.parameters.iter().enumerate() {
            if schema.name.trim().is_empty() {
                return Err(QueryError::EmptyParameterName(position));
            }
            if !seen.insert(schema.name.as_str()) {
                tracing::warn!(
                    "Query '{}' declares parameter '{}' more than once; the first declaration wins",
                    self.name,
                    schema.name
                );
            }
            check_parameter(schema)?;
        }

        for name in placeholders(&self.query) {
            if !seen.contains(name.as_str()) {
                return Err(QueryError::UndeclaredPlaceholder(name));
            }
        }

        Ok(())
    }

    pub fn into_template(self, created_by: Option<ObjectId>) -> QueryTemplate {
        let now = Utc::now();
        QueryTemplate {
            id: ObjectId::new(),
            name: self.name,
            description: self.description,
            collection: self.collection,
            query: self.query,
            parameters: self.parameters,
            category: self.category,
            tags: self.tags,
            active: self.active.unwrap_or(true),
            execution_count: 0,
            last_executed: None,
            average_execution_time: 0.0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the definition of `template`, keeping id, ownership and statistics
    pub fn apply_to(self, template: &mut QueryTemplate) {
        template.name = self.name;
        template.description = self.description;
        template.collection = self.collection;
        template.query = self.query;
        template.parameters = self.parameters;
        template.category = self.category;
        template.tags = self.tags;
        if let Some(active) = self.active {
            template.active = active;
        }
        template.updated_at = Utc::now();
    }
}

impl From<&QueryTemplate> for NewQueryTemplate {
    fn from(template: &QueryTemplate) -> Self {
        Self {
            name: template.name.clone(),
            description: template.description.clone(),
            collection: template.collection,
            query: template.query.clone(),
            parameters: template.parameters.clone(),
            category: template.category,
            tags: template.tags.clone(),
            active: Some(template.active),
        }
    }
}

fn check_parameter(schema: &ParameterSchema) -> Result<(), QueryError> {
    if let Some(pattern) = schema.validation.as_ref().and_then(|v| v.pattern.as_deref()) {
        regex::Regex::new(pattern).map_err(|e| QueryError::InvalidPattern {
            name: schema.name.clone(),
            reason: e.to_string(),
        })?;
    }

    if let Some(default) = &schema.default_value {
        let matches_type = match schema.param_type {
            // A boolean default must be an actual boolean, same as provided values
            ParameterType::Boolean => default.is_boolean(),
            other => ParamValue::coerce(other, default).is_ok(),
        };
        if !matches_type {
            return Err(QueryError::InvalidDefault {
                name: schema.name.clone(),
                expected: schema.param_type,
            });
        }
    }

    Ok(())
}
