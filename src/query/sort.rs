// ============================================================================
// Sort parameter conversion
// ============================================================================
//
// Accepted shapes:
// - "title"                       → title ASC
// - "title:desc,createdAt:asc"    → comma separated keys
// - ["title:desc", "id"]          → lists of the above, flattened in order
// - { "author": { "name": "desc" } } → nested object, dotted field path
//
// Object keys are visited in map order; use the list form when the relative
// order of several keys matters.
// ============================================================================

use super::{OrderBy, SortDirection};
use crate::core::{EntityError, Result};
use serde_json::{Map, Value as JsonValue};

/// Translate a sort specification into ordered (field, direction) pairs.
pub fn convert_sort_query_params(sort: &JsonValue) -> Result<Vec<OrderBy>> {
    match sort {
        JsonValue::String(spec) => spec.split(',').map(convert_single_sort_param).collect(),
        JsonValue::Array(items) => {
            let mut order_by = Vec::new();
            for item in items {
                order_by.extend(convert_sort_query_params(item)?);
            }
            Ok(order_by)
        }
        JsonValue::Object(obj) => {
            let mut order_by = Vec::new();
            convert_nested_sort_param(obj, "", &mut order_by)?;
            Ok(order_by)
        }
        other => Err(EntityError::InvalidParams(format!(
            "Invalid sort parameter: {}",
            other
        ))),
    }
}

fn convert_single_sort_param(spec: &str) -> Result<OrderBy> {
    let mut parts = spec.trim().splitn(2, ':');
    let field = parts.next().unwrap_or_default().trim();
    let direction = parts.next().unwrap_or("asc");

    if field.is_empty() {
        return Err(EntityError::InvalidParams(
            "Sort field cannot be empty".to_string(),
        ));
    }

    Ok(OrderBy {
        field: field.to_string(),
        direction: parse_direction(direction)?,
    })
}

fn convert_nested_sort_param(
    obj: &Map<String, JsonValue>,
    prefix: &str,
    out: &mut Vec<OrderBy>,
) -> Result<()> {
    for (key, value) in obj {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            JsonValue::String(direction) => out.push(OrderBy {
                field: path,
                direction: parse_direction(direction)?,
            }),
            JsonValue::Object(nested) => convert_nested_sort_param(nested, &path, out)?,
            other => {
                return Err(EntityError::InvalidParams(format!(
                    "Invalid sort direction for '{}': {}",
                    path, other
                )));
            }
        }
    }
    Ok(())
}

fn parse_direction(direction: &str) -> Result<SortDirection> {
    match direction.trim().to_lowercase().as_str() {
        "asc" => Ok(SortDirection::Asc),
        "desc" => Ok(SortDirection::Desc),
        other => Err(EntityError::InvalidParams(format!(
            "Sort order must be one of asc, desc, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_sort() {
        let order_by = convert_sort_query_params(&json!("title:desc, id")).unwrap();
        assert_eq!(order_by, vec![OrderBy::desc("title"), OrderBy::asc("id")]);
    }

    #[test]
    fn test_direction_is_case_insensitive() {
        let order_by = convert_sort_query_params(&json!("title:DESC")).unwrap();
        assert_eq!(order_by, vec![OrderBy::desc("title")]);
    }

    #[test]
    fn test_list_sort_keeps_order() {
        let order_by = convert_sort_query_params(&json!(["b:desc", "a", "c:asc,d:desc"])).unwrap();
        assert_eq!(
            order_by,
            vec![
                OrderBy::desc("b"),
                OrderBy::asc("a"),
                OrderBy::asc("c"),
                OrderBy::desc("d"),
            ]
        );
    }

    #[test]
    fn test_nested_object_sort() {
        let order_by = convert_sort_query_params(&json!({"author": {"name": "desc"}})).unwrap();
        assert_eq!(order_by, vec![OrderBy::desc("author.name")]);
    }

    #[test]
    fn test_invalid_sort() {
        assert!(convert_sort_query_params(&json!("title:sideways")).is_err());
        assert!(convert_sort_query_params(&json!(":desc")).is_err());
        assert!(convert_sort_query_params(&json!("a,,b")).is_err());
        assert!(convert_sort_query_params(&json!(42)).is_err());
        assert!(convert_sort_query_params(&json!({"title": 1})).is_err());
    }
}
