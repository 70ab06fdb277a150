//! Content-type schemas
//!
//! A schema describes one kind of persisted entity: its `uid`, whether it is
//! a collection, a singleton or a component, its draft/publish capability
//! and its attributes. Attribute descriptors are a tagged union so that every
//! schema-driven walk in the crate dispatches on [`AttributeKind`] and the
//! compiler checks that each variant is handled.

mod raw;
mod registry;

pub use registry::{InMemorySchemaRegistry, SchemaRegistry};

use crate::core::{Entity, PUBLISHED_AT_FIELD, Result};
use raw::RawAttribute;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    CollectionType,
    SingleType,
    Component,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOptions {
    #[serde(default)]
    pub draft_and_publish: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeSchema {
    pub uid: String,
    pub model_name: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub options: SchemaOptions,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl ContentTypeSchema {
    fn new(uid: impl Into<String>, model_name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            uid: uid.into(),
            model_name: model_name.into(),
            kind,
            options: SchemaOptions::default(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn collection(uid: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self::new(uid, model_name, ContentKind::CollectionType)
    }

    pub fn single_type(uid: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self::new(uid, model_name, ContentKind::SingleType)
    }

    pub fn component(uid: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self::new(uid, model_name, ContentKind::Component)
    }

    pub fn draft_and_publish(mut self) -> Self {
        self.options.draft_and_publish = true;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn is_single_type(&self) -> bool {
        self.kind == ContentKind::SingleType
    }

    pub fn has_draft_and_publish(&self) -> bool {
        self.options.draft_and_publish
    }

    /// An entity is a draft when its type supports draft/publish and it has
    /// no publish timestamp.
    pub fn is_draft(&self, data: &Entity) -> bool {
        self.has_draft_and_publish()
            && data
                .get(PUBLISHED_AT_FIELD)
                .is_none_or(JsonValue::is_null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    OneWay,
    ManyWay,
    MorphOne,
    MorphMany,
    MorphToOne,
    MorphToMany,
}

impl RelationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            Self::OneToMany | Self::ManyToMany | Self::ManyWay | Self::MorphMany | Self::MorphToMany
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Text,
    RichText,
    Email,
    Password,
    Uid,
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Json,
    Enumeration(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Relation {
        relation: RelationKind,
        target: String,
    },
    Component {
        component: String,
        repeatable: bool,
    },
    DynamicZone {
        components: Vec<String>,
    },
    Media {
        multiple: bool,
    },
    Scalar(ScalarType),
}

/// Attribute descriptor: a kind plus the options every kind shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttribute", into = "RawAttribute")]
pub struct Attribute {
    pub kind: AttributeKind,
    pub required: bool,
    pub private: bool,
    /// String length bounds for scalars, item count bounds for
    /// repeatable components and dynamic zones.
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Attribute {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: false,
            private: false,
            min: None,
            max: None,
        }
    }

    pub fn scalar(scalar: ScalarType) -> Self {
        Self::new(AttributeKind::Scalar(scalar))
    }

    pub fn relation(relation: RelationKind, target: impl Into<String>) -> Self {
        Self::new(AttributeKind::Relation {
            relation,
            target: target.into(),
        })
    }

    pub fn component(component: impl Into<String>, repeatable: bool) -> Self {
        Self::new(AttributeKind::Component {
            component: component.into(),
            repeatable,
        })
    }

    pub fn dynamic_zone<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AttributeKind::DynamicZone {
            components: components.into_iter().map(Into::into).collect(),
        })
    }

    pub fn media(multiple: bool) -> Self {
        Self::new(AttributeKind::Media { multiple })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Private attributes and passwords never leave the service in events.
    pub fn is_hidden(&self) -> bool {
        self.private || matches!(self.kind, AttributeKind::Scalar(ScalarType::Password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ARTICLE: &str = r#"{
        "uid": "api::article.article",
        "modelName": "article",
        "kind": "collectionType",
        "options": { "draftAndPublish": true },
        "attributes": {
            "title": { "type": "string", "required": true, "maxLength": 80 },
            "status": { "type": "enumeration", "enum": ["new", "old"] },
            "author": { "type": "relation", "relation": "manyToOne", "target": "api::author.author" },
            "seo": { "type": "component", "component": "shared.seo" },
            "blocks": { "type": "dynamiczone", "components": ["blocks.text", "blocks.quote"] },
            "cover": { "type": "media" }
        }
    }"#;

    #[test]
    fn test_parse_schema_json() {
        let schema = ContentTypeSchema::from_json(ARTICLE).unwrap();

        assert_eq!(schema.kind, ContentKind::CollectionType);
        assert!(schema.has_draft_and_publish());
        assert_eq!(schema.attributes.len(), 6);

        let title = schema.get_attribute("title").unwrap();
        assert!(title.required);
        assert_eq!(title.max, Some(80));
        assert_eq!(title.kind, AttributeKind::Scalar(ScalarType::String));

        assert_eq!(
            schema.get_attribute("status").unwrap().kind,
            AttributeKind::Scalar(ScalarType::Enumeration(vec!["new".into(), "old".into()]))
        );
        assert_eq!(
            schema.get_attribute("seo").unwrap().kind,
            AttributeKind::Component {
                component: "shared.seo".into(),
                repeatable: false,
            }
        );
        assert!(matches!(
            schema.get_attribute("blocks").unwrap().kind,
            AttributeKind::DynamicZone { ref components } if components.len() == 2
        ));
    }

    #[test]
    fn test_schema_round_trips_through_json() {
        let schema = ContentTypeSchema::from_json(ARTICLE).unwrap();
        let text = serde_json::to_string(&schema).unwrap();
        assert_eq!(ContentTypeSchema::from_json(&text).unwrap(), schema);
    }

    #[test]
    fn test_relation_without_target_is_rejected() {
        let err = ContentTypeSchema::from_json(
            r#"{"uid": "a", "modelName": "a", "kind": "collectionType",
                "attributes": {"x": {"type": "relation", "relation": "oneToOne"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_unknown_attribute_type_is_rejected() {
        assert!(ContentTypeSchema::from_json(
            r#"{"uid": "a", "modelName": "a", "kind": "collectionType",
                "attributes": {"x": {"type": "hologram"}}}"#,
        )
        .is_err());
    }

    #[test]
    fn test_is_draft() {
        let schema = ContentTypeSchema::collection("api::a.a", "a").draft_and_publish();
        let draft = json!({"title": "x"});
        let published = json!({"title": "x", "published_at": "2024-01-01T00:00:00Z"});

        assert!(schema.is_draft(draft.as_object().unwrap()));
        assert!(!schema.is_draft(published.as_object().unwrap()));

        let plain = ContentTypeSchema::collection("api::b.b", "b");
        assert!(!plain.is_draft(draft.as_object().unwrap()));
    }
}
