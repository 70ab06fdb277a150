use crate::core::{EntityError, Result};
use serde_json::Value as JsonValue;

/// Read an integer out of a number or a numeric string. `2.0` counts as an
/// integer, `2.5` does not.
fn to_integer(value: &JsonValue, param: &str) -> Result<i64> {
    let parsed = match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral)),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };

    parsed.ok_or_else(|| {
        EntityError::InvalidParams(format!("{} expected an integer, got {}", param, value))
    })
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// Convert a `start` parameter into an offset (non-negative integer).
pub fn convert_start_query_param(value: &JsonValue) -> Result<u64> {
    let start = to_integer(value, "start")?;
    u64::try_from(start).map_err(|_| {
        EntityError::InvalidParams(format!("start expected a positive integer, got {}", start))
    })
}

/// Convert a `limit` parameter. `-1` asks for every row, which resolves to
/// `max_limit` when one is configured. Larger limits are clamped.
pub fn convert_limit_query_param(value: &JsonValue, max_limit: Option<u64>) -> Result<Option<u64>> {
    let limit = to_integer(value, "limit")?;
    if limit == -1 {
        return Ok(max_limit);
    }

    let limit = u64::try_from(limit).map_err(|_| {
        EntityError::InvalidParams(format!("limit expected a positive integer, got {}", limit))
    })?;

    Ok(Some(match max_limit {
        Some(max) => limit.min(max),
        None => limit,
    }))
}

/// Convert a `page` parameter (1-based).
pub fn convert_page_query_param(value: &JsonValue) -> Result<u64> {
    let page = to_integer(value, "page")?;
    if page < 1 {
        return Err(EntityError::InvalidParams(format!(
            "page expected a strictly positive integer, got {}",
            page
        )));
    }
    Ok(page as u64)
}

/// Convert a `pageSize` parameter, clamped to `max_limit`.
pub fn convert_page_size_query_param(value: &JsonValue, max_limit: Option<u64>) -> Result<u64> {
    let size = to_integer(value, "pageSize")?;
    if size < 1 {
        return Err(EntityError::InvalidParams(format!(
            "pageSize expected a strictly positive integer, got {}",
            size
        )));
    }
    let size = size as u64;
    Ok(max_limit.map_or(size, |max| size.min(max)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_accepts_integers_and_numeric_strings() {
        assert_eq!(convert_start_query_param(&json!(0)).unwrap(), 0);
        assert_eq!(convert_start_query_param(&json!(15)).unwrap(), 15);
        assert_eq!(convert_start_query_param(&json!("15")).unwrap(), 15);
        assert_eq!(convert_start_query_param(&json!(4.0)).unwrap(), 4);
    }

    #[test]
    fn test_start_rejects_negative_and_non_integers() {
        for bad in [json!(-1), json!("-3"), json!(1.5), json!("abc"), json!(true), json!(null)] {
            let err = convert_start_query_param(&bad).unwrap_err();
            assert!(matches!(err, EntityError::InvalidParams(_)), "{:?}", bad);
        }
    }

    #[test]
    fn test_limit_conversion() {
        assert_eq!(convert_limit_query_param(&json!(10), None).unwrap(), Some(10));
        assert_eq!(convert_limit_query_param(&json!("0"), None).unwrap(), Some(0));
        assert_eq!(convert_limit_query_param(&json!(-1), None).unwrap(), None);
        assert_eq!(convert_limit_query_param(&json!(-1), Some(50)).unwrap(), Some(50));
        assert_eq!(convert_limit_query_param(&json!(500), Some(50)).unwrap(), Some(50));
        assert!(convert_limit_query_param(&json!(-2), None).is_err());
        assert!(convert_limit_query_param(&json!("ten"), None).is_err());
        assert!(convert_limit_query_param(&json!(2.5), None).is_err());
    }

    #[test]
    fn test_page_conversion() {
        assert_eq!(convert_page_query_param(&json!(2)).unwrap(), 2);
        assert!(convert_page_query_param(&json!(0)).is_err());
        assert_eq!(convert_page_size_query_param(&json!(25), Some(10)).unwrap(), 10);
        assert!(convert_page_size_query_param(&json!(0), None).is_err());
    }
}
