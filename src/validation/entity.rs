use crate::core::{COMPONENT_TYPE_FIELD, Entity, EntityError, ID_FIELD, PUBLISHED_AT_FIELD, Result};
use crate::schema::{Attribute, AttributeKind, ContentKind, ContentTypeSchema, ScalarType, SchemaRegistry};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Number, Value as JsonValue};
use std::sync::Arc;

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref UID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9\-_.~]*$").unwrap();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Drafts skip `required` checks
    pub is_draft: bool,
}

impl ValidationOptions {
    pub fn draft(is_draft: bool) -> Self {
        Self { is_draft }
    }
}

/// Field validator: type-checks and coerces a payload against a schema,
/// returning the sanitized payload or a rejection.
#[async_trait]
pub trait EntityValidator: Send + Sync {
    async fn validate_entity_creation(
        &self,
        model: &ContentTypeSchema,
        data: Entity,
        options: ValidationOptions,
    ) -> Result<Entity>;

    async fn validate_entity_update(
        &self,
        model: &ContentTypeSchema,
        data: Entity,
        options: ValidationOptions,
    ) -> Result<Entity>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

/// Schema-driven validator.
///
/// - unknown keys are dropped, `id` is only kept inside components
/// - `required` holds on create (every attribute) and on update (present
///   attributes), unless the entity is a draft
/// - numbers and booleans given as strings are coerced
/// - components and dynamic zones are validated recursively with their own
///   schemas; an item without `id` is validated with creation rules
pub struct SchemaValidator {
    registry: Arc<dyn SchemaRegistry>,
}

impl SchemaValidator {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    fn validate_object(
        &self,
        model: &ContentTypeSchema,
        data: Entity,
        mode: Mode,
        is_draft: bool,
        path: &str,
    ) -> Result<Entity> {
        let nested = model.kind == ContentKind::Component;
        let mut out = Entity::new();

        for (key, value) in data {
            let field_path = join(path, &key);

            if key == ID_FIELD || key == COMPONENT_TYPE_FIELD {
                if nested {
                    out.insert(key, value);
                }
                continue;
            }

            if key == PUBLISHED_AT_FIELD && model.has_draft_and_publish() {
                out.insert(key, check_published_at(&field_path, value)?);
                continue;
            }

            let Some(attribute) = model.get_attribute(&key) else {
                continue;
            };

            let value = self.validate_attribute(attribute, value, mode, is_draft, &field_path)?;
            out.insert(key, value);
        }

        if mode == Mode::Create && !is_draft {
            for (name, attribute) in &model.attributes {
                if attribute.required && !out.contains_key(name) {
                    return Err(EntityError::validation(join(path, name), "is required"));
                }
            }
        }

        Ok(out)
    }

    fn validate_attribute(
        &self,
        attribute: &Attribute,
        value: JsonValue,
        mode: Mode,
        is_draft: bool,
        path: &str,
    ) -> Result<JsonValue> {
        if value.is_null() {
            if attribute.required && !is_draft {
                return Err(EntityError::validation(path, "is required"));
            }
            return Ok(JsonValue::Null);
        }

        match &attribute.kind {
            AttributeKind::Scalar(scalar) => check_scalar(scalar, attribute, value, path),
            AttributeKind::Relation { .. } => check_reference(value, path, true),
            AttributeKind::Media { multiple } => check_media(value, *multiple, path),
            AttributeKind::Component {
                component,
                repeatable,
            } => {
                let schema = self.model(component)?;
                match (value, *repeatable) {
                    (JsonValue::Array(items), true) => {
                        check_count(attribute, items.len(), path)?;
                        let items = items
                            .into_iter()
                            .enumerate()
                            .map(|(i, item)| {
                                self.validate_component(&schema, item, mode, is_draft, &format!("{path}[{i}]"))
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(JsonValue::Array(items))
                    }
                    (JsonValue::Array(_), false) => Err(EntityError::Shape(format!(
                        "'{path}' is a single component and cannot take an array"
                    ))),
                    (_, true) => Err(EntityError::Shape(format!(
                        "'{path}' is a repeatable component and expects an array"
                    ))),
                    (item, false) => self.validate_component(&schema, item, mode, is_draft, path),
                }
            }
            AttributeKind::DynamicZone { components } => {
                let JsonValue::Array(items) = value else {
                    return Err(EntityError::Shape(format!(
                        "'{path}' is a dynamic zone and expects an array"
                    )));
                };
                check_count(attribute, items.len(), path)?;

                let items = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_path = format!("{path}[{i}]");
                        let component = item
                            .get(COMPONENT_TYPE_FIELD)
                            .and_then(JsonValue::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| {
                                EntityError::validation(join(&item_path, COMPONENT_TYPE_FIELD), "is required")
                            })?;
                        if !components.is_empty() && !components.contains(&component) {
                            return Err(EntityError::validation(
                                join(&item_path, COMPONENT_TYPE_FIELD),
                                format!("'{component}' is not allowed in this dynamic zone"),
                            ));
                        }
                        let schema = self.model(&component)?;
                        self.validate_component(&schema, item, mode, is_draft, &item_path)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(JsonValue::Array(items))
            }
        }
    }

    fn validate_component(
        &self,
        schema: &ContentTypeSchema,
        item: JsonValue,
        mode: Mode,
        is_draft: bool,
        path: &str,
    ) -> Result<JsonValue> {
        let JsonValue::Object(data) = item else {
            return Err(EntityError::Shape(format!("'{path}' expects a component object")));
        };
        let mode = if data.contains_key(ID_FIELD) { mode } else { Mode::Create };
        Ok(JsonValue::Object(self.validate_object(schema, data, mode, is_draft, path)?))
    }

    fn model(&self, uid: &str) -> Result<Arc<ContentTypeSchema>> {
        self.registry
            .get_model(uid)
            .ok_or_else(|| EntityError::ModelNotFound(uid.to_string()))
    }
}

#[async_trait]
impl EntityValidator for SchemaValidator {
    async fn validate_entity_creation(
        &self,
        model: &ContentTypeSchema,
        data: Entity,
        options: ValidationOptions,
    ) -> Result<Entity> {
        self.validate_object(model, data, Mode::Create, options.is_draft, "")
    }

    async fn validate_entity_update(
        &self,
        model: &ContentTypeSchema,
        data: Entity,
        options: ValidationOptions,
    ) -> Result<Entity> {
        self.validate_object(model, data, Mode::Update, options.is_draft, "")
    }
}

// ============================================================================
// Field checks
// ============================================================================

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn check_published_at(path: &str, value: JsonValue) -> Result<JsonValue> {
    match &value {
        JsonValue::Null => Ok(value),
        JsonValue::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => Ok(value),
        _ => Err(EntityError::validation(path, "must be a datetime or null")),
    }
}

fn check_count(attribute: &Attribute, len: usize, path: &str) -> Result<()> {
    if let Some(min) = attribute.min
        && len < min
    {
        return Err(EntityError::validation(path, format!("must contain at least {min} items")));
    }
    if let Some(max) = attribute.max
        && len > max
    {
        return Err(EntityError::validation(path, format!("must contain at most {max} items")));
    }
    Ok(())
}

fn check_length(attribute: &Attribute, text: &str, path: &str) -> Result<()> {
    let len = text.chars().count();
    if let Some(min) = attribute.min
        && len < min
    {
        return Err(EntityError::validation(path, format!("must be at least {min} characters")));
    }
    if let Some(max) = attribute.max
        && len > max
    {
        return Err(EntityError::validation(path, format!("must be at most {max} characters")));
    }
    Ok(())
}

fn check_scalar(scalar: &ScalarType, attribute: &Attribute, value: JsonValue, path: &str) -> Result<JsonValue> {
    match scalar {
        ScalarType::String | ScalarType::Text | ScalarType::RichText | ScalarType::Password => {
            let text = expect_str(&value, path)?;
            check_length(attribute, text, path)?;
            Ok(value)
        }
        ScalarType::Email => {
            let text = expect_str(&value, path)?;
            if !EMAIL_PATTERN.is_match(text) {
                return Err(EntityError::validation(path, "must be a valid email"));
            }
            check_length(attribute, text, path)?;
            Ok(value)
        }
        ScalarType::Uid => {
            let text = expect_str(&value, path)?;
            if !UID_PATTERN.is_match(text) {
                return Err(EntityError::validation(path, "must only contain url-safe characters"));
            }
            check_length(attribute, text, path)?;
            Ok(value)
        }
        ScalarType::Integer | ScalarType::BigInteger => match &value {
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|_| EntityError::validation(path, "must be an integer")),
            _ => Err(EntityError::validation(path, "must be an integer")),
        },
        ScalarType::Float | ScalarType::Decimal => match &value {
            JsonValue::Number(_) => Ok(value),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(JsonValue::Number)
                .ok_or_else(|| EntityError::validation(path, "must be a number")),
            _ => Err(EntityError::validation(path, "must be a number")),
        },
        ScalarType::Boolean => match &value {
            JsonValue::Bool(_) => Ok(value),
            JsonValue::String(s) if s == "true" => Ok(JsonValue::Bool(true)),
            JsonValue::String(s) if s == "false" => Ok(JsonValue::Bool(false)),
            _ => Err(EntityError::validation(path, "must be a boolean")),
        },
        ScalarType::Date => {
            let text = expect_str(&value, path)?;
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|_| EntityError::validation(path, "must be a date (YYYY-MM-DD)"))?;
            Ok(value)
        }
        ScalarType::DateTime => {
            let text = expect_str(&value, path)?;
            DateTime::parse_from_rfc3339(text)
                .map_err(|_| EntityError::validation(path, "must be an RFC 3339 datetime"))?;
            Ok(value)
        }
        ScalarType::Time => {
            let text = expect_str(&value, path)?;
            NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                .map_err(|_| EntityError::validation(path, "must be a time (HH:MM[:SS])"))?;
            Ok(value)
        }
        ScalarType::Json => Ok(value),
        ScalarType::Enumeration(values) => {
            let text = expect_str(&value, path)?;
            if !values.iter().any(|v| v == text) {
                return Err(EntityError::validation(
                    path,
                    format!("must be one of [{}]", values.join(", ")),
                ));
            }
            Ok(value)
        }
    }
}

fn expect_str<'a>(value: &'a JsonValue, path: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| EntityError::validation(path, "must be a string"))
}

fn is_reference(value: &JsonValue) -> bool {
    match value {
        JsonValue::Number(n) => n.is_i64() || n.is_u64(),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Object(obj) => obj.get(ID_FIELD).is_some_and(is_reference),
        _ => false,
    }
}

/// Relation values: an id, a list of ids, or a connect/set/disconnect
/// envelope of id lists.
fn check_reference(value: JsonValue, path: &str, allow_envelope: bool) -> Result<JsonValue> {
    let valid = match &value {
        JsonValue::Array(items) => items.iter().all(is_reference),
        JsonValue::Object(obj) if allow_envelope && !obj.contains_key(ID_FIELD) => {
            obj.iter().all(|(key, list)| {
                matches!(key.as_str(), "connect" | "set" | "disconnect")
                    && list.as_array().is_some_and(|items| items.iter().all(is_reference))
            })
        }
        other => is_reference(other),
    };

    if valid {
        Ok(value)
    } else {
        Err(EntityError::validation(path, "must reference related entries by id"))
    }
}

fn check_media(value: JsonValue, multiple: bool, path: &str) -> Result<JsonValue> {
    if value.is_array() && !multiple {
        return Err(EntityError::validation(path, "accepts a single file"));
    }
    check_reference(value, path, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InMemorySchemaRegistry, RelationKind};
    use serde_json::json;

    fn validator() -> (SchemaValidator, Arc<ContentTypeSchema>) {
        let registry = InMemorySchemaRegistry::new()
            .with(
                ContentTypeSchema::collection("api::article.article", "article")
                    .draft_and_publish()
                    .attribute("title", Attribute::scalar(ScalarType::String).required().max(10))
                    .attribute("email", Attribute::scalar(ScalarType::Email))
                    .attribute("views", Attribute::scalar(ScalarType::Integer))
                    .attribute("featured", Attribute::scalar(ScalarType::Boolean))
                    .attribute("day", Attribute::scalar(ScalarType::Date))
                    .attribute(
                        "status",
                        Attribute::scalar(ScalarType::Enumeration(vec!["draft".into(), "final".into()])),
                    )
                    .attribute("author", Attribute::relation(RelationKind::ManyToOne, "api::author.author"))
                    .attribute("slides", Attribute::component("shared.slide", true).max(2))
                    .attribute("blocks", Attribute::dynamic_zone(["blocks.text"])),
            )
            .with(
                ContentTypeSchema::component("shared.slide", "slide")
                    .attribute("caption", Attribute::scalar(ScalarType::String).required()),
            )
            .with(
                ContentTypeSchema::component("blocks.text", "text")
                    .attribute("body", Attribute::scalar(ScalarType::Text)),
            )
            .with(ContentTypeSchema::component("blocks.quote", "quote"));

        let registry: Arc<dyn SchemaRegistry> = Arc::new(registry);
        let model = registry.get_model("api::article.article").unwrap();
        (SchemaValidator::new(registry), model)
    }

    fn data(value: JsonValue) -> Entity {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_sanitizes_and_coerces() {
        let (validator, model) = validator();
        let out = validator
            .validate_entity_creation(
                &model,
                data(json!({
                    "id": 5,
                    "title": "Hello",
                    "views": "12",
                    "featured": "true",
                    "unknown": 1,
                    "published_at": null
                })),
                ValidationOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            JsonValue::Object(out),
            json!({"title": "Hello", "views": 12, "featured": true, "published_at": null})
        );
    }

    #[tokio::test]
    async fn test_required_is_skipped_for_drafts() {
        let (validator, model) = validator();
        let err = validator
            .validate_entity_creation(&model, data(json!({"views": 1})), ValidationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation { ref path, .. } if path == "title"));

        validator
            .validate_entity_creation(&model, data(json!({"views": 1})), ValidationOptions::draft(true))
            .await
            .unwrap();

        validator
            .validate_entity_update(&model, data(json!({"views": 1})), ValidationOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scalar_rejections() {
        let (validator, model) = validator();
        let cases = [
            (json!({"title": "x", "email": "nope"}), "email"),
            (json!({"title": "far too long title"}), "title"),
            (json!({"title": "x", "views": 1.5}), "views"),
            (json!({"title": "x", "day": "2024-13-01"}), "day"),
            (json!({"title": "x", "status": "other"}), "status"),
            (json!({"title": "x", "author": {"connect": [true]}}), "author"),
        ];

        for (payload, expected) in cases {
            let err = validator
                .validate_entity_update(&model, data(payload), ValidationOptions::default())
                .await
                .unwrap_err();
            assert!(
                matches!(err, EntityError::Validation { ref path, .. } if path == expected),
                "{expected}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_nested_components_are_validated() {
        let (validator, model) = validator();

        let err = validator
            .validate_entity_creation(
                &model,
                data(json!({"title": "x", "slides": [{"caption": "a"}, {}]})),
                ValidationOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation { ref path, .. } if path == "slides[1].caption"));

        let err = validator
            .validate_entity_creation(
                &model,
                data(json!({"title": "x", "slides": {"caption": "a"}})),
                ValidationOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Shape(_)));

        let err = validator
            .validate_entity_creation(
                &model,
                data(json!({"title": "x", "slides": [{"caption": "a"}, {"caption": "b"}, {"caption": "c"}]})),
                ValidationOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation { ref path, .. } if path == "slides"));
    }

    #[tokio::test]
    async fn test_dynamic_zone_members() {
        let (validator, model) = validator();

        let out = validator
            .validate_entity_update(
                &model,
                data(json!({"blocks": [{"__component": "blocks.text", "id": 3, "body": "hi", "junk": 1}]})),
                ValidationOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(out["blocks"], json!([{"__component": "blocks.text", "id": 3, "body": "hi"}]));

        let err = validator
            .validate_entity_update(
                &model,
                data(json!({"blocks": [{"__component": "blocks.quote"}]})),
                ValidationOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation { ref path, .. } if path == "blocks[0].__component"));
    }
}
