use serde_json::Value;

use super::error::FilterError;
use super::types::{validate_column, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"col desc, other"`, `["col desc", "other asc"]` or `{"col": "desc"}`
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        match order {
            Value::Null => {}
            Value::String(s) => out.extend(Self::parse_order_string(s)?),
            Value::Array(arr) => {
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        other => {
                            return Err(FilterError::InvalidOperatorData(format!(
                                "Order entries must be strings, got {}",
                                other
                            )))
                        }
                    }
                }
            }
            Value::Object(obj) => {
                for (column, dir) in obj {
                    validate_column(column)?;
                    let Some(dir) = dir.as_str() else {
                        return Err(FilterError::InvalidOperatorData(format!(
                            "Sort direction for '{}' must be \"asc\" or \"desc\", got {}",
                            column, dir
                        )));
                    };
                    let sort = Self::parse_direction(dir)?;
                    out.push(FilterOrderInfo { column: column.clone(), sort });
                }
            }
            other => {
                return Err(FilterError::InvalidOperatorData(format!("Invalid order: {}", other)));
            }
        }
        Ok(out)
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            let Some(column) = it.next() else { continue };
            validate_column(column)?;
            let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
            out.push(FilterOrderInfo { column: column.to_string(), sort });
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOperatorData(format!("Invalid sort direction: {}", dir)))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
