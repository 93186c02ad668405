use serde_json::{Map, Value};

use super::types::{ParameterSchema, ParameterType, QueryTemplate};
use super::value::{coerce_date, coerce_number, format_number, ObjectId};

/// Check provided parameters against a template's declared parameters.
///
/// Every applicable error is collected; an empty list means the parameters
/// are valid. Required parameters are reported first (declaration order),
/// then each provided key in map order.
pub fn validate(template: &QueryTemplate, provided: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();

    for schema in template.parameters.iter().filter(|p| p.required) {
        if !provided.contains_key(&schema.name) {
            errors.push(format!("Required parameter '{}' is missing", schema.name));
        }
    }

    for (name, value) in provided {
        match template.parameter(name) {
            Some(schema) => check_value(schema, value, &mut errors),
            None => errors.push(format!("Unknown parameter '{}'", name)),
        }
    }

    errors
}

fn check_value(schema: &ParameterSchema, value: &Value, errors: &mut Vec<String>) {
    let name = &schema.name;

    match schema.param_type {
        ParameterType::Number => match coerce_number(value) {
            Ok(n) => check_range(schema, n, errors),
            Err(_) => errors.push(format!("Parameter '{}' must be a number", name)),
        },
        ParameterType::Boolean => {
            if !value.is_boolean() {
                errors.push(format!("Parameter '{}' must be a boolean", name));
            }
        }
        ParameterType::Date => {
            if coerce_date(value).is_err() {
                errors.push(format!("Parameter '{}' must be a valid date", name));
            }
        }
        ParameterType::ObjectId => {
            if ObjectId::from_value(value).is_err() {
                errors.push(format!("Parameter '{}' must be a valid ObjectId", name));
            }
        }
        ParameterType::String => {}
    }

    if let Some(allowed) = schema.allowed_values() {
        if !allowed.iter().any(|member| same_member(member, value)) {
            errors.push(format!(
                "Parameter '{}' must be one of: {}",
                name,
                allowed.iter().map(display_value).collect::<Vec<_>>().join(", ")
            ));
        }
    }
}

// Bounds are inclusive
fn check_range(schema: &ParameterSchema, n: f64, errors: &mut Vec<String>) {
    let Some(validation) = schema.validation.as_ref() else {
        return;
    };
    if let Some(min) = validation.min {
        if n < min {
            errors.push(format!("Parameter '{}' must be at least {}", schema.name, format_number(min)));
        }
    }
    if let Some(max) = validation.max {
        if n > max {
            errors.push(format!("Parameter '{}' must be at most {}", schema.name, format_number(max)));
        }
    }
}

// Numbers compare by value so 2.0 matches a declared 2
fn same_member(member: &Value, value: &Value) -> bool {
    match (member, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => member == value,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::ParameterValidation;
    use crate::testing::{find_by_uni, params, template_with};
    use serde_json::json;

    fn bounded_age() -> ParameterSchema {
        ParameterSchema::new("age", ParameterType::Number).with_validation(ParameterValidation {
            min: Some(13.0),
            max: Some(120.0),
            ..Default::default()
        })
    }

    #[test]
    fn reports_missing_required_parameter() {
        let template = find_by_uni();
        assert_eq!(validate(&template, &params(json!({}))), vec!["Required parameter 'uni' is missing"]);
        assert!(validate(&template, &params(json!({"uni": "Colombo"}))).is_empty());
    }

    #[test]
    fn reports_every_missing_required_parameter() {
        let template = template_with(vec![
            ParameterSchema::new("a", ParameterType::String).required(),
            ParameterSchema::new("b", ParameterType::Number),
            ParameterSchema::new("c", ParameterType::Boolean).required(),
        ]);
        let errors = validate(&template, &params(json!({"b": 1})));
        assert_eq!(
            errors,
            vec!["Required parameter 'a' is missing", "Required parameter 'c' is missing"]
        );
    }

    #[test]
    fn unknown_parameters_skip_type_checks() {
        let template = template_with(vec![ParameterSchema::new("age", ParameterType::Number)]);
        let errors = validate(&template, &params(json!({"colour": "red", "shape": 12})));
        assert_eq!(errors, vec!["Unknown parameter 'colour'", "Unknown parameter 'shape'"]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let template = template_with(vec![bounded_age()]);
        for ok in [13, 50, 120] {
            assert!(validate(&template, &params(json!({ "age": ok }))).is_empty(), "age = {}", ok);
        }
        assert_eq!(
            validate(&template, &params(json!({"age": 200}))),
            vec!["Parameter 'age' must be at most 120"]
        );
        assert_eq!(
            validate(&template, &params(json!({"age": "12"}))),
            vec!["Parameter 'age' must be at least 13"]
        );
    }

    #[test]
    fn non_numeric_value_skips_range_check() {
        let template = template_with(vec![bounded_age()]);
        assert_eq!(
            validate(&template, &params(json!({"age": "old"}))),
            vec!["Parameter 'age' must be a number"]
        );
    }

    #[test]
    fn type_checks_per_declared_type() {
        let template = template_with(vec![
            ParameterSchema::new("flag", ParameterType::Boolean),
            ParameterSchema::new("since", ParameterType::Date),
            ParameterSchema::new("id", ParameterType::ObjectId),
            ParameterSchema::new("label", ParameterType::String),
        ]);

        let errors = validate(
            &template,
            &params(json!({"flag": "true", "id": "not-an-id", "label": 42, "since": "not a date"})),
        );
        assert_eq!(
            errors,
            vec![
                "Parameter 'flag' must be a boolean",
                "Parameter 'id' must be a valid ObjectId",
                "Parameter 'since' must be a valid date",
            ]
        );

        let ok = validate(
            &template,
            &params(json!({"flag": false, "since": "2024-01-31", "id": "507f1f77bcf86cd799439011"})),
        );
        assert!(ok.is_empty(), "{:?}", ok);
    }

    #[test]
    fn minute_precision_dates_are_valid() {
        let template = template_with(vec![ParameterSchema::new("since", ParameterType::Date)]);
        for since in ["2024-01-31T10:00Z", "2024-01-31T10:00", "2024-01-31 10:00", "2024/01/31"] {
            let errors = validate(&template, &params(json!({ "since": since })));
            assert!(errors.is_empty(), "{}: {:?}", since, errors);
        }
    }

    #[test]
    fn enum_applies_regardless_of_type() {
        let template = template_with(vec![
            ParameterSchema::new("role", ParameterType::String).with_validation(ParameterValidation {
                allowed: Some(vec![json!("student"), json!("lecturer")]),
                ..Default::default()
            }),
            ParameterSchema::new("year", ParameterType::Number).with_validation(ParameterValidation {
                allowed: Some(vec![json!(1), json!(2)]),
                ..Default::default()
            }),
        ]);

        assert!(validate(&template, &params(json!({"role": "student", "year": 2}))).is_empty());
        assert_eq!(
            validate(&template, &params(json!({"role": "admin", "year": 3}))),
            vec!["Parameter 'role' must be one of: student, lecturer", "Parameter 'year' must be one of: 1, 2"]
        );
    }

    #[test]
    fn enum_numbers_match_by_value() {
        let template = template_with(vec![ParameterSchema::new("year", ParameterType::Number).with_validation(
            ParameterValidation {
                allowed: Some(vec![json!(1), json!(2)]),
                ..Default::default()
            },
        )]);
        assert!(validate(&template, &params(json!({"year": 2.0}))).is_empty());
        assert!(validate(&template, &params(json!({"year": 1}))).is_empty());
        assert_eq!(
            validate(&template, &params(json!({"year": 2.5}))),
            vec!["Parameter 'year' must be one of: 1, 2"]
        );
        // Strings are not numeric members
        assert_eq!(
            validate(&template, &params(json!({"year": "2"}))),
            vec!["Parameter 'year' must be one of: 1, 2"]
        );
    }

    #[test]
    fn pattern_is_not_enforced() {
        let template = template_with(vec![ParameterSchema::new("code", ParameterType::String).with_validation(
            ParameterValidation {
                pattern: Some("^[A-Z]{3}$".to_string()),
                ..Default::default()
            },
        )]);
        assert!(validate(&template, &params(json!({"code": "lowercase"}))).is_empty());
    }

    #[test]
    fn object_id_scenario() {
        let template = template_with(vec![ParameterSchema::new("id", ParameterType::ObjectId)]);
        assert_eq!(
            validate(&template, &params(json!({"id": "not-an-id"}))),
            vec!["Parameter 'id' must be a valid ObjectId"]
        );
    }
}
