use std::collections::HashSet;

use serde_json::Value;

use super::model::{METHODS, SpecVersion, resolve_ref};
use crate::error::SpecError;

/// Structural validation of a Swagger 2.0 / OpenAPI 3 document.
///
/// Every violation found is reported, not only the first one.
///
/// # Errors
/// Returns [`SpecError::Invalid`] listing the violations.
pub fn validate_spec(document: &Value) -> Result<(), SpecError> {
    let mut violations = Vec::new();

    if SpecVersion::detect(document).is_none() {
        violations.push("missing or unsupported `swagger` / `openapi` version marker".to_owned());
    }
    for field in ["title", "version"] {
        if document
            .get("info")
            .and_then(|info| info.get(field))
            .and_then(Value::as_str)
            .is_none()
        {
            violations.push(format!("`info.{field}` must be a string"));
        }
    }

    match document.get("paths").and_then(Value::as_object) {
        None => violations.push("`paths` must be an object".to_owned()),
        Some(paths) => {
            let mut operation_ids = HashSet::new();
            for (path, item) in paths {
                validate_path(document, path, item, &mut operation_ids, &mut violations);
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SpecError::Invalid(violations))
    }
}

fn declared_path_params<'a>(document: &'a Value, list: Option<&'a Value>) -> Vec<(&'a str, bool)> {
    list.and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|raw| resolve_ref(document, raw))
        .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
        .filter_map(|p| {
            let name = p.get("name").and_then(Value::as_str)?;
            let required = p.get("required").and_then(Value::as_bool).unwrap_or(false);
            Some((name, required))
        })
        .collect()
}

fn template_names(path: &str) -> Vec<&str> {
    path.split('{')
        .skip(1)
        .filter_map(|segment| segment.split_once('}').map(|(name, _)| name))
        .collect()
}

fn validate_path<'a>(
    document: &'a Value,
    path: &'a str,
    item: &'a Value,
    operation_ids: &mut HashSet<&'a str>,
    violations: &mut Vec<String>,
) {
    if !path.starts_with('/') {
        violations.push(format!("path `{path}` must start with `/`"));
    }
    let item = resolve_ref(document, item);
    let shared = declared_path_params(document, item.get("parameters"));
    let names = template_names(path);

    for method in METHODS {
        let Some(op) = item.get(method) else {
            continue;
        };
        let location = format!("{} {path}", method.to_ascii_uppercase());

        if let Some(id) = op.get("operationId").and_then(Value::as_str)
            && !operation_ids.insert(id)
        {
            violations.push(format!("{location}: duplicate operationId `{id}`"));
        }

        if !op
            .get("responses")
            .and_then(Value::as_object)
            .is_some_and(|r| !r.is_empty())
        {
            violations.push(format!("{location}: `responses` must be a non-empty object"));
        }

        let mut declared = shared.clone();
        declared.extend(declared_path_params(document, op.get("parameters")));
        for name in &names {
            if !declared.iter().any(|(declared, _)| declared == name) {
                violations.push(format!(
                    "{location}: path parameter `{name}` is not declared"
                ));
            }
        }
        for (name, required) in &declared {
            if !required {
                violations.push(format!(
                    "{location}: path parameter `{name}` must be required"
                ));
            }
        }
    }
}
