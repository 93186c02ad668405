use serde_json::Value;

use super::error::FilterError;
use super::types::{validate_column, FilterOp};

/// Compiles a Mongo-style filter document into a parameterized SQL predicate
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_offset: usize,
    max_depth: u32,
    timestamp_columns: &'static [&'static str],
}

impl FilterWhere {
    pub fn new(starting_param_index: usize, max_depth: u32) -> Self {
        Self {
            param_values: vec![],
            param_offset: starting_param_index,
            max_depth,
            timestamp_columns: &[],
        }
    }

    /// String values compared against these columns are cast to `timestamptz`
    pub fn with_timestamp_columns(mut self, columns: &'static [&'static str]) -> Self {
        self.timestamp_columns = columns;
        self
    }

    /// Returns the predicate and its bind values (`$1`.. numbered after `starting_param_index`)
    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        timestamp_columns: &'static [&'static str],
    ) -> Result<(String, Vec<Value>), FilterError> {
        let max_depth = crate::config::config().query.max_nested_depth;
        let mut filter_where = Self::new(starting_param_index, max_depth).with_timestamp_columns(timestamp_columns);
        let sql = filter_where.parse_document(where_data, 0)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_document(&mut self, where_data: &Value, depth: u32) -> Result<String, FilterError> {
        if depth > self.max_depth {
            return Err(FilterError::TooDeep(self.max_depth));
        }

        let obj = match where_data {
            Value::Null => return Ok("1=1".to_string()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        };

        let mut parts = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                parts.push(self.parse_logical_operator(key, value, depth)?);
            } else {
                validate_column(key)?;
                parts.extend(self.parse_field_condition(key, value)?);
            }
        }

        Ok(if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") })
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value, depth: u32) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(if op == "$and" { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    sql_parts.push(format!("({})", self.parse_document(v, depth + 1)?));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => Ok(format!("NOT ({})", self.parse_document(value, depth + 1)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, column: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        match value {
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops
                .iter()
                .map(|(op_key, op_val)| self.build_condition(column, FilterOp::from_key(op_key)?, op_val))
                .collect(),
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_condition(column, FilterOp::Eq, value)?]),
        }
    }

    fn build_condition(&mut self, column: &str, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", column);

        match op {
            FilterOp::Eq if data.is_null() => Ok(format!("{} IS NULL", quoted_column)),
            FilterOp::Ne if data.is_null() => Ok(format!("{} IS NOT NULL", quoted_column)),
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    // Nothing is IN an empty set; everything is NOT IN it
                    return Ok(if op == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.column_param(column, v)).collect();
                let keyword = if op == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    let low = self.column_param(column, values[0].clone());
                    let high = self.column_param(column, values[1].clone());
                    Ok(format!("{} BETWEEN {} AND {}", quoted_column, low, high))
                }
                _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Exists => match data {
                Value::Bool(true) => Ok(format!("{} IS NOT NULL", quoted_column)),
                Value::Bool(false) => Ok(format!("{} IS NULL", quoted_column)),
                _ => Err(FilterError::InvalidOperatorData("$exists requires a boolean".to_string())),
            },
            _ => {
                let sql_op = op
                    .comparison()
                    .ok_or_else(|| FilterError::UnsupportedOperator(format!("{:?}", op)))?;
                if matches!(data, Value::Array(_) | Value::Object(_)) && op != FilterOp::Eq && op != FilterOp::Ne {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} on '{}' requires a scalar value",
                        sql_op, column
                    )));
                }
                Ok(format!("{} {} {}", quoted_column, sql_op, self.column_param(column, data.clone())))
            }
        }
    }

    fn column_param(&mut self, column: &str, value: Value) -> String {
        let cast = value.is_string() && self.timestamp_columns.iter().any(|c| *c == column);
        let placeholder = self.param(value);
        if cast {
            format!("{}::timestamptz", placeholder)
        } else {
            placeholder
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_offset + self.param_values.len())
    }
}
