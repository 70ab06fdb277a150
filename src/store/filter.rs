// ============================================================================
// Filter evaluation for the in-memory store
// ============================================================================
//
// A `where` object is a conjunction of entries. Each entry is either a
// logical operator ($and, $or, $not) or a field path mapped to a condition:
// - a scalar                  → equality
// - an array                  → membership ($in)
// - an object of $operators   → every operator must hold
// - an object without $keys   → condition on a nested (populated) object
//
// Comparison follows the usual store conventions: numbers compare
// numerically (numeric strings included), NULL never equals anything.
// ============================================================================

use crate::core::{Entity, EntityError, Result};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

/// Does `row` satisfy `filter`? A missing or empty filter matches everything.
pub fn matches_filter(row: &Entity, filter: Option<&JsonValue>) -> Result<bool> {
    match filter {
        None | Some(JsonValue::Null) => Ok(true),
        Some(JsonValue::Object(obj)) => matches_object(row, obj),
        Some(other) => Err(EntityError::InvalidParams(format!(
            "Filters must be an object, got {}",
            other
        ))),
    }
}

fn matches_object(row: &Entity, filter: &Map<String, JsonValue>) -> Result<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in as_filter_list(key, condition)? {
                    if !matches_filter(row, Some(sub))? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in as_filter_list(key, condition)? {
                    if matches_filter(row, Some(sub))? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$not" => !matches_filter(row, Some(condition))?,
            field => matches_field(resolve_path(row, field), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn as_filter_list<'a>(operator: &str, value: &'a JsonValue) -> Result<&'a Vec<JsonValue>> {
    value.as_array().ok_or_else(|| {
        EntityError::InvalidParams(format!("{} expects an array of filters", operator))
    })
}

/// Walk a dotted path through nested objects.
pub(super) fn resolve_path<'a>(row: &'a Entity, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = row.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn matches_field(value: Option<&JsonValue>, condition: &JsonValue) -> Result<bool> {
    match condition {
        JsonValue::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            for (op, operand) in ops {
                if !apply_operator(value, op, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        JsonValue::Object(nested) => match value {
            Some(JsonValue::Object(obj)) => matches_object(obj, nested),
            Some(JsonValue::Array(items)) => {
                for item in items {
                    if let JsonValue::Object(obj) = item
                        && matches_object(obj, nested)?
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        },
        JsonValue::Array(_) => apply_operator(value, "$in", condition),
        scalar => apply_operator(value, "$eq", scalar),
    }
}

fn apply_operator(value: Option<&JsonValue>, op: &str, operand: &JsonValue) -> Result<bool> {
    let value = value.filter(|v| !v.is_null());

    let result = match op {
        "$eq" => value.is_some_and(|v| loose_eq(v, operand)),
        "$ne" => !value.is_some_and(|v| loose_eq(v, operand)),
        "$in" => {
            let list = operand_list(op, operand)?;
            value.is_some_and(|v| list.iter().any(|o| loose_eq(v, o)))
        }
        "$notIn" => {
            let list = operand_list(op, operand)?;
            !value.is_some_and(|v| list.iter().any(|o| loose_eq(v, o)))
        }
        "$lt" => compare_present(value, operand) == Some(Ordering::Less),
        "$lte" => matches!(compare_present(value, operand), Some(Ordering::Less | Ordering::Equal)),
        "$gt" => compare_present(value, operand) == Some(Ordering::Greater),
        "$gte" => matches!(compare_present(value, operand), Some(Ordering::Greater | Ordering::Equal)),
        "$null" => value.is_none() == truthy(operand),
        "$notNull" => value.is_some() == truthy(operand),
        "$contains" => text_test(value, operand, |v, o| v.contains(o)),
        "$notContains" => !text_test(value, operand, |v, o| v.contains(o)),
        "$containsi" => text_test(value, operand, |v, o| v.to_lowercase().contains(&o.to_lowercase())),
        "$startsWith" => text_test(value, operand, |v, o| v.starts_with(o)),
        "$endsWith" => text_test(value, operand, |v, o| v.ends_with(o)),
        "$between" => {
            let bounds = operand_list(op, operand)?;
            match bounds.as_slice() {
                [low, high] => {
                    matches!(compare_present(value, low), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare_present(value, high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => {
                    return Err(EntityError::InvalidParams(
                        "$between expects exactly two bounds".to_string(),
                    ));
                }
            }
        }
        other => {
            return Err(EntityError::UnsupportedOperation(format!(
                "Unknown filter operator: {}",
                other
            )));
        }
    };

    Ok(result)
}

fn operand_list<'a>(op: &str, operand: &'a JsonValue) -> Result<&'a Vec<JsonValue>> {
    operand
        .as_array()
        .ok_or_else(|| EntityError::InvalidParams(format!("{} expects an array", op)))
}

fn truthy(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Null | JsonValue::Bool(false))
}

fn text_test(value: Option<&JsonValue>, operand: &JsonValue, test: impl Fn(&str, &str) -> bool) -> bool {
    match (value.and_then(JsonValue::as_str), operand.as_str()) {
        (Some(v), Some(o)) => test(v, o),
        _ => false,
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn loose_eq(left: &JsonValue, right: &JsonValue) -> bool {
    if left.is_number() || right.is_number() {
        return match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }
    left == right
}

fn compare_present(value: Option<&JsonValue>, operand: &JsonValue) -> Option<Ordering> {
    let value = value?;
    if operand.is_null() {
        return None;
    }
    compare_values(value, operand)
}

/// Order two non-null JSON scalars. `None` when they are not comparable.
pub fn compare_values(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        _ => {
            let (a, b) = (as_number(left)?, as_number(right)?);
            a.partial_cmp(&b)
        }
    }
}
