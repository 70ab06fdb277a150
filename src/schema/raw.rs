//! Registry JSON layout of an attribute: one flat object with a `type`
//! discriminator. Converted into the typed [`Attribute`] on load.

use super::{Attribute, AttributeKind, RelationKind, ScalarType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawAttribute {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relation: Option<RelationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    component: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    repeatable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    components: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    multiple: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<usize>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn scalar_from_name(name: &str, enum_values: Vec<String>) -> Option<ScalarType> {
    let scalar = match name {
        "string" => ScalarType::String,
        "text" => ScalarType::Text,
        "richtext" => ScalarType::RichText,
        "email" => ScalarType::Email,
        "password" => ScalarType::Password,
        "uid" => ScalarType::Uid,
        "integer" => ScalarType::Integer,
        "biginteger" => ScalarType::BigInteger,
        "float" => ScalarType::Float,
        "decimal" => ScalarType::Decimal,
        "boolean" => ScalarType::Boolean,
        "date" => ScalarType::Date,
        "datetime" => ScalarType::DateTime,
        "time" => ScalarType::Time,
        "json" => ScalarType::Json,
        "enumeration" => ScalarType::Enumeration(enum_values),
        _ => return None,
    };
    Some(scalar)
}

fn scalar_name(scalar: &ScalarType) -> &'static str {
    match scalar {
        ScalarType::String => "string",
        ScalarType::Text => "text",
        ScalarType::RichText => "richtext",
        ScalarType::Email => "email",
        ScalarType::Password => "password",
        ScalarType::Uid => "uid",
        ScalarType::Integer => "integer",
        ScalarType::BigInteger => "biginteger",
        ScalarType::Float => "float",
        ScalarType::Decimal => "decimal",
        ScalarType::Boolean => "boolean",
        ScalarType::Date => "date",
        ScalarType::DateTime => "datetime",
        ScalarType::Time => "time",
        ScalarType::Json => "json",
        ScalarType::Enumeration(_) => "enumeration",
    }
}

fn is_textual(kind: &AttributeKind) -> bool {
    matches!(
        kind,
        AttributeKind::Scalar(
            ScalarType::String
                | ScalarType::Text
                | ScalarType::RichText
                | ScalarType::Email
                | ScalarType::Password
                | ScalarType::Uid
        )
    )
}

impl TryFrom<RawAttribute> for Attribute {
    type Error = String;

    fn try_from(raw: RawAttribute) -> Result<Self, Self::Error> {
        let kind = match raw.ty.as_str() {
            "relation" => AttributeKind::Relation {
                relation: raw.relation.unwrap_or(RelationKind::OneWay),
                target: raw
                    .target
                    .ok_or_else(|| "relation attribute requires a target".to_string())?,
            },
            "component" => AttributeKind::Component {
                component: raw
                    .component
                    .ok_or_else(|| "component attribute requires a component uid".to_string())?,
                repeatable: raw.repeatable,
            },
            "dynamiczone" => AttributeKind::DynamicZone {
                components: raw.components,
            },
            "media" => AttributeKind::Media {
                multiple: raw.multiple,
            },
            other => AttributeKind::Scalar(
                scalar_from_name(other, raw.enum_values)
                    .ok_or_else(|| format!("unknown attribute type '{}'", other))?,
            ),
        };

        Ok(Self {
            kind,
            required: raw.required,
            private: raw.private,
            min: raw.min_length.or(raw.min),
            max: raw.max_length.or(raw.max),
        })
    }
}

impl From<Attribute> for RawAttribute {
    fn from(attribute: Attribute) -> Self {
        let textual = is_textual(&attribute.kind);
        let mut raw = RawAttribute {
            required: attribute.required,
            private: attribute.private,
            ..Default::default()
        };

        if textual {
            raw.min_length = attribute.min;
            raw.max_length = attribute.max;
        } else {
            raw.min = attribute.min;
            raw.max = attribute.max;
        }

        match attribute.kind {
            AttributeKind::Relation { relation, target } => {
                raw.ty = "relation".into();
                raw.relation = Some(relation);
                raw.target = Some(target);
            }
            AttributeKind::Component {
                component,
                repeatable,
            } => {
                raw.ty = "component".into();
                raw.component = Some(component);
                raw.repeatable = repeatable;
            }
            AttributeKind::DynamicZone { components } => {
                raw.ty = "dynamiczone".into();
                raw.components = components;
            }
            AttributeKind::Media { multiple } => {
                raw.ty = "media".into();
                raw.multiple = multiple;
            }
            AttributeKind::Scalar(scalar) => {
                raw.ty = scalar_name(&scalar).into();
                if let ScalarType::Enumeration(values) = scalar {
                    raw.enum_values = values;
                }
            }
        }

        raw
    }
}
