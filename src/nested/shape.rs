use crate::core::{COMPONENT_TYPE_FIELD, Entity, EntityError, EntityId, Result};
use crate::schema::{AttributeKind, SchemaRegistry};
use serde_json::Value as JsonValue;

/// Check the array/object shape of every nested value in `data`, recursing
/// into component values. Pure: runs before any store call.
pub fn check_shapes(uid: &str, data: &Entity, registry: &dyn SchemaRegistry) -> Result<()> {
    let model = registry
        .get_model(uid)
        .ok_or_else(|| EntityError::ModelNotFound(uid.to_string()))?;

    for (name, attribute) in &model.attributes {
        let Some(value) = data.get(name).filter(|v| !v.is_null()) else {
            continue;
        };

        match &attribute.kind {
            AttributeKind::Component {
                component,
                repeatable: true,
            } => {
                for item in expect_array(name, value)? {
                    check_shapes(component, component_object(name, item)?, registry)?;
                }
            }
            AttributeKind::Component {
                component,
                repeatable: false,
            } => {
                if value.is_array() {
                    return Err(EntityError::Shape(format!(
                        "Expected an object for non repeatable component '{name}'"
                    )));
                }
                check_shapes(component, component_object(name, value)?, registry)?;
            }
            AttributeKind::DynamicZone { .. } => {
                for item in expect_array(name, value)? {
                    let (component, data) = dynamic_zone_member(name, item)?;
                    check_shapes(component, data, registry)?;
                }
            }
            AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => {}
        }
    }

    Ok(())
}

/// Repeatable components and dynamic zones only take arrays.
pub(super) fn expect_array<'a>(name: &str, value: &'a JsonValue) -> Result<&'a Vec<JsonValue>> {
    value
        .as_array()
        .ok_or_else(|| EntityError::Shape(format!("Expected an array for '{name}'")))
}

pub(super) fn component_object<'a>(name: &str, value: &'a JsonValue) -> Result<&'a Entity> {
    value
        .as_object()
        .ok_or_else(|| EntityError::Shape(format!("Expected component objects in '{name}'")))
}

/// A dynamic-zone item: its declared component type and its fields.
pub(super) fn dynamic_zone_member<'a>(name: &str, value: &'a JsonValue) -> Result<(&'a str, &'a Entity)> {
    let data = component_object(name, value)?;
    let component = data
        .get(COMPONENT_TYPE_FIELD)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| {
            EntityError::Shape(format!("Dynamic zone '{name}' items must declare a {COMPONENT_TYPE_FIELD}"))
        })?;
    Ok((component, data))
}

/// Incoming items that carry an id, as `(component uid, id, fields)`.
pub(super) fn incoming_rows<'a>(
    name: &str,
    kind: &AttributeKind,
    value: &'a JsonValue,
) -> Result<Vec<(String, EntityId, &'a Entity)>> {
    let items: Vec<&JsonValue> = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut rows = Vec::new();
    for item in items {
        let (component, data) = match kind {
            AttributeKind::Component { component, .. } => (component.as_str(), component_object(name, item)?),
            AttributeKind::DynamicZone { .. } => dynamic_zone_member(name, item)?,
            AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => {
                return Ok(Vec::new());
            }
        };
        if let Some(id) = EntityId::of(data) {
            rows.push((component.to_string(), id, data));
        }
    }
    Ok(rows)
}

/// Sub-rows an attribute value points at, as `(component uid, id)` pairs.
/// Accepts populated objects as well as bare ids.
pub(super) fn owned_rows(kind: &AttributeKind, value: &JsonValue) -> Vec<(String, EntityId)> {
    let items: Vec<&JsonValue> = match value {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    match kind {
        AttributeKind::Component { component, .. } => items
            .into_iter()
            .filter_map(EntityId::from_reference)
            .map(|id| (component.clone(), id))
            .collect(),
        AttributeKind::DynamicZone { .. } => items
            .into_iter()
            .filter_map(|item| {
                let component = item.get(COMPONENT_TYPE_FIELD)?.as_str()?;
                Some((component.to_string(), EntityId::from_reference(item)?))
            })
            .collect(),
        AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, ContentTypeSchema, InMemorySchemaRegistry, ScalarType};
    use serde_json::json;

    fn registry() -> InMemorySchemaRegistry {
        InMemorySchemaRegistry::new()
            .with(
                ContentTypeSchema::collection("api::page.page", "page")
                    .attribute("slides", Attribute::component("shared.slide", true))
                    .attribute("hero", Attribute::component("shared.hero", false))
                    .attribute("blocks", Attribute::dynamic_zone(["shared.slide"])),
            )
            .with(
                ContentTypeSchema::component("shared.hero", "hero")
                    .attribute("buttons", Attribute::component("shared.slide", true)),
            )
            .with(
                ContentTypeSchema::component("shared.slide", "slide")
                    .attribute("text", Attribute::scalar(ScalarType::String)),
            )
    }

    fn check(value: JsonValue) -> Result<()> {
        check_shapes("api::page.page", value.as_object().unwrap(), &registry())
    }

    #[test]
    fn test_valid_shapes() {
        check(json!({
            "slides": [{"text": "a"}],
            "hero": {"buttons": [{"text": "go"}]},
            "blocks": [{"__component": "shared.slide", "text": "x"}],
        }))
        .unwrap();
        check(json!({"slides": null, "hero": null})).unwrap();
    }

    #[test]
    fn test_shape_mismatches() {
        for payload in [
            json!({"slides": {"text": "a"}}),
            json!({"slides": ["a"]}),
            json!({"hero": [{"text": "a"}]}),
            json!({"hero": {"buttons": {"text": "go"}}}),
            json!({"blocks": {"__component": "shared.slide"}}),
            json!({"blocks": [{"text": "no tag"}]}),
        ] {
            let err = check(payload.clone()).unwrap_err();
            assert!(matches!(err, EntityError::Shape(_)), "{payload}");
        }
    }

    #[test]
    fn test_owned_rows_from_populated_and_raw_values() {
        let component = AttributeKind::Component {
            component: "shared.slide".into(),
            repeatable: true,
        };
        assert_eq!(
            owned_rows(&component, &json!([{"id": 1, "text": "a"}, 2])),
            vec![
                ("shared.slide".to_string(), EntityId::Int(1)),
                ("shared.slide".to_string(), EntityId::Int(2)),
            ]
        );

        let zone = AttributeKind::DynamicZone { components: vec![] };
        assert_eq!(
            owned_rows(&zone, &json!([{"id": 4, "__component": "a.b"}, {"id": 5}])),
            vec![("a.b".to_string(), EntityId::Int(4))]
        );
        assert!(owned_rows(&zone, &JsonValue::Null).is_empty());
    }
}
