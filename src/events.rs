//! Lifecycle events
//!
//! Writes announce themselves on an [`EventHub`] once the primary row is
//! persisted. Emission is fire-and-forget: a hub never fails the write.

use crate::core::{COMPONENT_TYPE_FIELD, Entity};
use crate::schema::{AttributeKind, ContentTypeSchema, SchemaRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{Level, event};

pub const ENTRY_CREATE: &str = "entry.create";
pub const ENTRY_UPDATE: &str = "entry.update";
pub const ENTRY_DELETE: &str = "entry.delete";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Model name of the content type
    pub model: String,
    /// Sanitized entry
    pub entry: Entity,
}

pub trait EventHub: Send + Sync {
    fn emit(&self, event: &str, payload: EventPayload);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: EventPayload,
}

/// Event hub over a tokio broadcast channel. Events emitted while nobody
/// is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventHub {
    tx: broadcast::Sender<Event>,
}

impl BroadcastEventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventHub for BroadcastEventHub {
    fn emit(&self, name: &str, payload: EventPayload) {
        let delivered = self
            .tx
            .send(Event {
                name: name.to_string(),
                payload,
            })
            .unwrap_or(0);
        event!(Level::DEBUG, event = %name, receivers = delivered, "event emitted");
    }
}

/// Strip private and password attributes, recursing into populated
/// components and dynamic-zone members.
pub fn sanitize_entity(mut entity: Entity, model: &ContentTypeSchema, registry: &dyn SchemaRegistry) -> Entity {
    for (name, attribute) in &model.attributes {
        if attribute.is_hidden() {
            entity.remove(name);
            continue;
        }

        let Some(value) = entity.get_mut(name) else {
            continue;
        };

        match &attribute.kind {
            AttributeKind::Component { component, .. } => {
                if let Some(schema) = registry.get_model(component) {
                    map_objects(value, |item| sanitize_entity(item, &schema, registry));
                }
            }
            AttributeKind::DynamicZone { .. } => map_objects(value, |item| {
                let schema = item
                    .get(COMPONENT_TYPE_FIELD)
                    .and_then(JsonValue::as_str)
                    .and_then(|uid| registry.get_model(uid));
                match schema {
                    Some(schema) => sanitize_entity(item, &schema, registry),
                    None => item,
                }
            }),
            AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => {}
        }
    }
    entity
}

/// Apply `f` to an object value or to every object of an array value.
fn map_objects(value: &mut JsonValue, f: impl Fn(Entity) -> Entity) {
    let objects: Vec<&mut Entity> = match value {
        JsonValue::Object(obj) => vec![obj],
        JsonValue::Array(items) => items.iter_mut().filter_map(JsonValue::as_object_mut).collect(),
        _ => return,
    };
    for obj in objects {
        let item = std::mem::take(obj);
        *obj = f(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, InMemorySchemaRegistry, ScalarType};
    use serde_json::json;

    #[test]
    fn test_broadcast_hub_delivers_to_subscribers() {
        let hub = BroadcastEventHub::default();
        hub.emit(ENTRY_CREATE, EventPayload { model: "lost".into(), entry: Entity::new() });

        let mut rx = hub.subscribe();
        hub.emit(
            ENTRY_UPDATE,
            EventPayload {
                model: "article".into(),
                entry: json!({"id": 1}).as_object().unwrap().clone(),
            },
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, ENTRY_UPDATE);
        assert_eq!(event.payload.model, "article");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sanitize_strips_hidden_attributes_recursively() {
        let registry = InMemorySchemaRegistry::new()
            .with(
                ContentTypeSchema::collection("api::user.user", "user")
                    .attribute("name", Attribute::scalar(ScalarType::String))
                    .attribute("password", Attribute::scalar(ScalarType::Password))
                    .attribute("notes", Attribute::scalar(ScalarType::Text).private())
                    .attribute("profile", Attribute::component("user.profile", false))
                    .attribute("extras", Attribute::dynamic_zone(["user.profile"])),
            )
            .with(
                ContentTypeSchema::component("user.profile", "profile")
                    .attribute("bio", Attribute::scalar(ScalarType::Text))
                    .attribute("secret", Attribute::scalar(ScalarType::String).private()),
            );
        let model = registry.get_model("api::user.user").unwrap();

        let entry = json!({
            "id": 1,
            "name": "ada",
            "password": "hash",
            "notes": "internal",
            "profile": {"id": 4, "bio": "hi", "secret": "x"},
            "extras": [{"id": 5, "__component": "user.profile", "secret": "y"}]
        });
        let clean = sanitize_entity(entry.as_object().unwrap().clone(), &model, &registry);

        assert_eq!(
            JsonValue::Object(clean),
            json!({
                "id": 1,
                "name": "ada",
                "profile": {"id": 4, "bio": "hi"},
                "extras": [{"id": 5, "__component": "user.profile"}]
            })
        );
    }
}
