use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use crate::query::{Collection, ObjectId, ParameterSchema, QueryCategory, QueryTemplate};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A query named '{0}' already exists")]
    Conflict(String),

    #[error("Query '{0}' not found")]
    NotFound(String),

    #[error("Stored query '{name}' is malformed: {reason}")]
    Corrupt { name: String, reason: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// List filters for templates. Deserializes straight from a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilter {
    pub category: Option<QueryCategory>,
    pub collection: Option<Collection>,
    pub tag: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl TemplateFilter {
    pub fn matches(&self, template: &QueryTemplate) -> bool {
        if !self.include_inactive && !template.active {
            return false;
        }
        if self.category.map_or(false, |c| c != template.category) {
            return false;
        }
        if self.collection.map_or(false, |c| c != template.collection) {
            return false;
        }
        if let Some(tag) = &self.tag {
            let tag = tag.trim().to_lowercase();
            if !template.tags.iter().any(|t| *t == tag) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_name = template.name.to_lowercase().contains(&needle);
            let in_description = template
                .description
                .as_deref()
                .map_or(false, |d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

/// Persistence for query templates, keyed by unique name
#[async_trait]
pub trait QueryRegistry: Send + Sync {
    async fn find_by_name(&self, name: &str, active_only: bool) -> Result<Option<QueryTemplate>, RegistryError>;

    /// Sorted by name
    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<QueryTemplate>, RegistryError>;

    /// Fails with `Conflict` if the name is taken
    async fn create(&self, template: QueryTemplate) -> Result<QueryTemplate, RegistryError>;

    /// Overwrites the template with the same id
    async fn save(&self, template: QueryTemplate) -> Result<QueryTemplate, RegistryError>;

    /// Apply one successful execution to the stored statistics
    async fn record_execution(&self, name: &str, elapsed_ms: f64, at: DateTime<Utc>) -> Result<(), RegistryError>;

    async fn ping(&self) -> Result<(), RegistryError>;
}

#[derive(Debug, FromRow)]
struct QueryRow {
    id: String,
    name: String,
    description: Option<String>,
    collection: String,
    query: Json<Value>,
    parameters: Json<Vec<ParameterSchema>>,
    category: String,
    tags: Vec<String>,
    active: bool,
    execution_count: i64,
    last_executed: Option<DateTime<Utc>>,
    average_execution_time: f64,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QueryRow> for QueryTemplate {
    type Error = RegistryError;

    fn try_from(row: QueryRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| RegistryError::Corrupt {
            name: row.name.clone(),
            reason,
        };

        let id = ObjectId::parse(&row.id).map_err(|e| corrupt(format!("id: {}", e)))?;
        let collection = row.collection.parse::<Collection>().map_err(|e| corrupt(format!("{}", e)))?;
        let category = row.category.parse::<QueryCategory>().map_err(|e| corrupt(format!("{}", e)))?;
        let created_by = row
            .created_by
            .as_deref()
            .map(ObjectId::parse)
            .transpose()
            .map_err(|e| corrupt(format!("createdBy: {}", e)))?;

        Ok(QueryTemplate {
            id,
            name: row.name,
            description: row.description,
            collection,
            query: row.query.0,
            parameters: row.parameters.0,
            category,
            tags: row.tags,
            active: row.active,
            execution_count: row.execution_count,
            last_executed: row.last_executed,
            average_execution_time: row.average_execution_time,
            created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_QUERY: &str = "SELECT id, name, description, collection, query, parameters, category, tags, active, \
     execution_count, last_executed, average_execution_time, created_by, created_at, updated_at FROM queries";

/// Postgres-backed registry over the `queries` table
#[derive(Clone)]
pub struct PgQueryRegistry {
    pool: PgPool,
}

impl PgQueryRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_write_error(name: &str, err: sqlx::Error) -> RegistryError {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                RegistryError::Conflict(name.to_string())
            }
            _ => RegistryError::Database(err),
        }
    }
}

#[async_trait]
impl QueryRegistry for PgQueryRegistry {
    async fn find_by_name(&self, name: &str, active_only: bool) -> Result<Option<QueryTemplate>, RegistryError> {
        let sql = format!("{} WHERE name = $1 AND (active OR NOT $2)", SELECT_QUERY);
        let row = sqlx::query_as::<_, QueryRow>(&sql)
            .bind(name)
            .bind(active_only)
            .fetch_optional(&self.pool)
            .await?;
        row.map(QueryTemplate::try_from).transpose()
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<QueryTemplate>, RegistryError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_QUERY);
        qb.push(" WHERE 1=1");
        if !filter.include_inactive {
            qb.push(" AND active");
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(collection) = filter.collection {
            qb.push(" AND collection = ").push_bind(collection.as_str());
        }
        if let Some(tag) = &filter.tag {
            qb.push(" AND ")
                .push_bind(tag.trim().to_lowercase())
                .push(" = ANY(tags)");
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY name");

        let rows = qb.build_query_as::<QueryRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(QueryTemplate::try_from).collect()
    }

    async fn create(&self, template: QueryTemplate) -> Result<QueryTemplate, RegistryError> {
        sqlx::query(
            "INSERT INTO queries (id, name, description, collection, query, parameters, category, tags, active, \
             execution_count, last_executed, average_execution_time, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(template.id.to_hex())
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.collection.as_str())
        .bind(Json(&template.query))
        .bind(Json(&template.parameters))
        .bind(template.category.as_str())
        .bind(&template.tags)
        .bind(template.active)
        .bind(template.execution_count)
        .bind(template.last_executed)
        .bind(template.average_execution_time)
        .bind(template.created_by.map(|id| id.to_hex()))
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(&template.name, e))?;

        tracing::info!("Created query template '{}'", template.name);
        Ok(template)
    }

    async fn save(&self, template: QueryTemplate) -> Result<QueryTemplate, RegistryError> {
        // Statistics are owned by record_execution and never overwritten here
        let result = sqlx::query(
            "UPDATE queries SET name = $2, description = $3, collection = $4, query = $5, parameters = $6, \
             category = $7, tags = $8, active = $9, updated_at = $10 WHERE id = $1",
        )
        .bind(template.id.to_hex())
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.collection.as_str())
        .bind(Json(&template.query))
        .bind(Json(&template.parameters))
        .bind(template.category.as_str())
        .bind(&template.tags)
        .bind(template.active)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(&template.name, e))?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(template.name));
        }
        Ok(template)
    }

    async fn record_execution(&self, name: &str, elapsed_ms: f64, at: DateTime<Utc>) -> Result<(), RegistryError> {
        let elapsed_ms = if elapsed_ms.is_finite() { elapsed_ms.max(0.0) } else { 0.0 };

        // Same rule as query::next_average, applied atomically
        let result = sqlx::query(
            "UPDATE queries SET \
                execution_count = execution_count + 1, \
                last_executed = GREATEST(last_executed, $2), \
                average_execution_time = CASE WHEN average_execution_time = 0 THEN $3 \
                                              ELSE (average_execution_time + $3) / 2 END \
             WHERE name = $1",
        )
        .bind(name)
        .bind(at)
        .bind(elapsed_ms)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
