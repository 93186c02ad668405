use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::types::QueryTemplate;
use super::value::ParamValue;

/// Build the concrete query document for `template`.
///
/// Expects parameters that already passed [`validate`](super::validate). Every
/// string node that is exactly `{{name}}` with `name` present in `provided` is
/// replaced by the coerced value. Tokens without a provided value are left
/// untouched, and tokens embedded in longer strings or in object keys are never
/// replaced.
pub fn substitute(template: &QueryTemplate, provided: &Map<String, Value>) -> Value {
    let mut document = template.query.clone();
    replace_placeholders(&mut document, &|name| resolve(template, provided, name));
    document
}

fn resolve(template: &QueryTemplate, provided: &Map<String, Value>, name: &str) -> Option<Value> {
    let raw = provided.get(name)?;
    let value = match template.parameter(name) {
        // Coercion failures fall back to the raw value; the engine never fails
        Some(schema) => ParamValue::coerce(schema.param_type, raw)
            .map(|v| v.to_json())
            .unwrap_or_else(|_| raw.clone()),
        None => raw.clone(),
    };
    Some(value)
}

fn replace_placeholders<F>(node: &mut Value, resolve: &F)
where
    F: Fn(&str) -> Option<Value>,
{
    let replacement = match node {
        Value::String(s) => placeholder_name(s).and_then(resolve),
        Value::Array(items) => {
            items.iter_mut().for_each(|item| replace_placeholders(item, resolve));
            None
        }
        Value::Object(map) => {
            map.values_mut().for_each(|item| replace_placeholders(item, resolve));
            None
        }
        _ => None,
    };

    if let Some(value) = replacement {
        *node = value;
    }
}

/// Name inside a whole-string `{{name}}` token
pub fn placeholder_name(s: &str) -> Option<&str> {
    let name = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if name.is_empty() || name.contains(['{', '}']) {
        return None;
    }
    Some(name)
}

/// Every placeholder token in a document, by name
pub fn placeholders(document: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_placeholders(document, &mut found);
    found
}

/// Placeholders still present after substitution
pub fn unresolved_placeholders(document: &Value) -> Vec<String> {
    placeholders(document).into_iter().collect()
}

fn collect_placeholders(node: &Value, found: &mut BTreeSet<String>) {
    match node {
        Value::String(s) => {
            if let Some(name) = placeholder_name(s) {
                found.insert(name.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_placeholders(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect_placeholders(item, found)),
        _ => {}
    }
}
