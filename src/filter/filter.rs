use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};
use crate::query::Collection;

/// SELECT builder for one collection table
pub struct Filter {
    collection: Collection,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl Filter {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        }
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if data.limit.is_some() || data.offset.is_some() {
            let limit = data.limit.unwrap_or(crate::config::config().query.default_result_limit);
            self.limit(limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if offset.map_or(false, |o| o < 0) {
            return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
        }

        let query_config = &crate::config::config().query;
        let applied_limit = if limit > query_config.max_result_limit {
            if query_config.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, query_config.max_result_limit);
            }
            query_config.max_result_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit = self
            .limit
            .unwrap_or(crate::config::config().query.default_result_limit);

        let mut query = format!("SELECT * FROM \"{}\" WHERE {}", self.collection.table_name(), where_clause);
        if !order_clause.is_empty() {
            query.push(' ');
            query.push_str(&order_clause);
        }
        query.push_str(&format!(" LIMIT {}", limit));
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            query.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(SqlResult { query, params })
    }

    fn where_sql(&self) -> Result<(String, Vec<Value>), FilterError> {
        match &self.where_data {
            Some(where_data) => FilterWhere::generate(where_data, 0, self.collection.timestamp_columns()),
            None => Ok(("1=1".to_string(), vec![])),
        }
    }
}
