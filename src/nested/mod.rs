//! Nested-structure manager
//!
//! Components and dynamic-zone members are stored as rows of their own
//! content type and owned by a parent entity. This module turns one logical
//! write of the parent into the store operations on those rows and returns
//! the field overrides (store ids) to merge into the parent row.
//!
//! Every operation first checks the shape of all nested values, so a
//! malformed payload is rejected before the first store call. Siblings of
//! one attribute are written concurrently; the resulting ids keep input
//! order. There is no transaction across attributes.

mod shape;

pub use shape::check_shapes;

use crate::config::EntityServiceConfig;
use crate::core::{COMPONENT_TYPE_FIELD, Entity, EntityError, EntityId, ID_FIELD, Result};
use crate::query::Query;
use crate::schema::{AttributeKind, ContentTypeSchema, SchemaRegistry};
use crate::store::EntityStore;
use async_recursion::async_recursion;
use futures::future::try_join_all;
use serde_json::{Value as JsonValue, json};
use shape::{component_object, dynamic_zone_member, expect_array, incoming_rows, owned_rows};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Level, event};

/// Stored values of the nested attributes an update touches.
type PreviousValues = BTreeMap<String, JsonValue>;

pub struct NestedStructureManager {
    db: Arc<dyn EntityStore>,
    registry: Arc<dyn SchemaRegistry>,
    config: EntityServiceConfig,
}

impl NestedStructureManager {
    pub fn new(
        db: Arc<dyn EntityStore>,
        registry: Arc<dyn SchemaRegistry>,
        config: EntityServiceConfig,
    ) -> Self {
        Self { db, registry, config }
    }

    fn model(&self, uid: &str) -> Result<Arc<ContentTypeSchema>> {
        self.registry
            .get_model(uid)
            .ok_or_else(|| EntityError::ModelNotFound(uid.to_string()))
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Create the sub-rows of every component and dynamic-zone attribute in
    /// `data`. Returns `{attribute: id | [ids] | [{id, __component}]}`.
    pub async fn create_components(&self, uid: &str, data: &Entity) -> Result<Entity> {
        check_shapes(uid, data, &*self.registry)?;
        self.create_nested(uid, data).await
    }

    #[async_recursion]
    async fn create_nested(&self, uid: &str, data: &Entity) -> Result<Entity> {
        let model = self.model(uid)?;
        let mut overrides = Entity::new();

        for (name, attribute) in &model.attributes {
            let Some(value) = data.get(name).filter(|v| !v.is_null()) else {
                continue;
            };

            let created = match &attribute.kind {
                AttributeKind::Component {
                    component,
                    repeatable: true,
                } => {
                    let items = expect_array(name, value)?;
                    let ids = try_join_all(
                        items
                            .iter()
                            .map(|item| self.create_component(name, component, item)),
                    )
                    .await?;
                    JsonValue::Array(ids.iter().map(EntityId::to_value).collect())
                }
                AttributeKind::Component {
                    component,
                    repeatable: false,
                } => self.create_component(name, component, value).await?.to_value(),
                AttributeKind::DynamicZone { .. } => {
                    let items = expect_array(name, value)?;
                    let members =
                        try_join_all(items.iter().map(|item| self.create_member(name, item))).await?;
                    JsonValue::Array(members)
                }
                AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => {
                    continue;
                }
            };

            overrides.insert(name.clone(), created);
        }

        Ok(overrides)
    }

    async fn create_component(&self, name: &str, component: &str, value: &JsonValue) -> Result<EntityId> {
        let data = component_object(name, value)?;
        let nested = self.create_nested(component, data).await?;

        let created = self
            .db
            .query(component)
            .create(&Query::new(), component_row(data, nested))
            .await?;

        EntityId::of(&created).ok_or_else(|| {
            EntityError::Store(format!("Store returned a '{component}' row without an id"))
        })
    }

    async fn create_member(&self, name: &str, value: &JsonValue) -> Result<JsonValue> {
        let (component, _) = dynamic_zone_member(name, value)?;
        let id = self.create_component(name, component, value).await?;
        Ok(member_reference(component, &id))
    }

    // ========================================================================
    // UPDATE
    // ========================================================================

    /// Write the nested attributes present in `data` for entity `id`.
    ///
    /// Items carrying an `id` update that sub-row, the others are created.
    /// Ids the entity does not own are rejected before any write. Sub-rows
    /// the entity stops referencing are deleted unless configured otherwise.
    pub async fn update_components(&self, uid: &str, id: &EntityId, data: &Entity) -> Result<Entity> {
        check_shapes(uid, data, &*self.registry)?;
        let previous = self.verify_ownership(uid, id, data).await?;
        self.update_nested(uid, id, data, Some(previous)).await
    }

    async fn load_previous(
        &self,
        uid: &str,
        model: &ContentTypeSchema,
        id: &EntityId,
        data: &Entity,
    ) -> Result<PreviousValues> {
        let names: Vec<&String> = model
            .attributes
            .iter()
            .filter(|(name, attribute)| is_nested(&attribute.kind) && data.contains_key(*name))
            .map(|(name, _)| name)
            .collect();

        let values = try_join_all(names.iter().map(|name| self.db.load(uid, id, name))).await?;
        Ok(names.into_iter().cloned().zip(values).collect())
    }

    #[async_recursion]
    async fn verify_ownership(&self, uid: &str, id: &EntityId, data: &Entity) -> Result<PreviousValues> {
        let model = self.model(uid)?;
        let previous = self.load_previous(uid, &model, id, data).await?;

        for (name, current) in &previous {
            let (Some(attribute), Some(value)) = (model.get_attribute(name), data.get(name)) else {
                continue;
            };
            let owned = owned_rows(&attribute.kind, current);

            for (component, item_id, item) in incoming_rows(name, &attribute.kind, value)? {
                if !owned.iter().any(|(c, i)| *c == component && *i == item_id) {
                    event!(
                        Level::WARN,
                        uid = %uid,
                        attribute = %name,
                        component = %component,
                        "component id not owned by entry"
                    );
                    return Err(EntityError::validation(
                        name.clone(),
                        format!("Component '{component}' with id {item_id} does not belong to this entry"),
                    ));
                }
                self.verify_ownership(&component, &item_id, item).await?;
            }
        }

        Ok(previous)
    }

    #[async_recursion]
    async fn update_nested(
        &self,
        uid: &str,
        id: &EntityId,
        data: &Entity,
        previous: Option<PreviousValues>,
    ) -> Result<Entity> {
        let model = self.model(uid)?;
        let previous = match previous {
            Some(previous) => previous,
            None => self.load_previous(uid, &model, id, data).await?,
        };

        let mut overrides = Entity::new();
        let mut stale = Vec::new();

        for (name, attribute) in &model.attributes {
            let Some(value) = data.get(name) else {
                continue;
            };

            let written = match &attribute.kind {
                _ if value.is_null() && is_nested(&attribute.kind) => JsonValue::Null,
                AttributeKind::Component {
                    component,
                    repeatable: true,
                } => {
                    let items = expect_array(name, value)?;
                    let ids = try_join_all(
                        items
                            .iter()
                            .map(|item| self.upsert_component(name, component, item)),
                    )
                    .await?;
                    JsonValue::Array(ids.iter().map(EntityId::to_value).collect())
                }
                AttributeKind::Component {
                    component,
                    repeatable: false,
                } => self.upsert_component(name, component, value).await?.to_value(),
                AttributeKind::DynamicZone { .. } => {
                    let items = expect_array(name, value)?;
                    let members =
                        try_join_all(items.iter().map(|item| self.upsert_member(name, item))).await?;
                    JsonValue::Array(members)
                }
                AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => {
                    continue;
                }
            };

            if let Some(current) = previous.get(name) {
                let kept = owned_rows(&attribute.kind, &written);
                stale.extend(
                    owned_rows(&attribute.kind, current)
                        .into_iter()
                        .filter(|row| !kept.contains(row)),
                );
            }
            overrides.insert(name.clone(), written);
        }

        if self.config.prune_stale_components && !stale.is_empty() {
            event!(Level::DEBUG, uid = %uid, stale = stale.len(), "pruning stale components");
            try_join_all(
                stale
                    .iter()
                    .map(|(component, row_id)| self.delete_row_tree(component, row_id)),
            )
            .await?;
        }

        Ok(overrides)
    }

    async fn upsert_component(&self, name: &str, component: &str, value: &JsonValue) -> Result<EntityId> {
        let data = component_object(name, value)?;
        let Some(item_id) = EntityId::of(data) else {
            return self.create_component(name, component, value).await;
        };

        let nested = self.update_nested(component, &item_id, data, None).await?;
        self.db
            .query(component)
            .update(&Query::by_id(&item_id), component_row(data, nested))
            .await?
            .ok_or_else(|| EntityError::not_found(component, &item_id))?;

        Ok(item_id)
    }

    async fn upsert_member(&self, name: &str, value: &JsonValue) -> Result<JsonValue> {
        let (component, _) = dynamic_zone_member(name, value)?;
        let id = self.upsert_component(name, component, value).await?;
        Ok(member_reference(component, &id))
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Delete every sub-row owned by entity `id`, depth first. Dynamic-zone
    /// members are included when `cascade_dynamic_zones` is set.
    #[async_recursion]
    pub async fn delete_components(&self, uid: &str, id: &EntityId) -> Result<()> {
        let model = self.model(uid)?;

        for (name, attribute) in &model.attributes {
            let cascade = match attribute.kind {
                AttributeKind::Component { .. } => true,
                AttributeKind::DynamicZone { .. } => self.config.cascade_dynamic_zones,
                AttributeKind::Relation { .. } | AttributeKind::Media { .. } | AttributeKind::Scalar(_) => false,
            };
            if !cascade {
                continue;
            }

            let current = self.db.query(uid).load(id, name).await?;
            let rows = owned_rows(&attribute.kind, &current);
            try_join_all(
                rows.iter()
                    .map(|(component, row_id)| self.delete_row_tree(component, row_id)),
            )
            .await?;
        }

        Ok(())
    }

    async fn delete_row_tree(&self, uid: &str, id: &EntityId) -> Result<()> {
        self.delete_components(uid, id).await?;
        self.db.query(uid).delete(&Query::by_id(id)).await?;
        Ok(())
    }
}

fn is_nested(kind: &AttributeKind) -> bool {
    matches!(kind, AttributeKind::Component { .. } | AttributeKind::DynamicZone { .. })
}

/// Fields of a component item as stored: no `id`, no type tag, nested ids
/// merged in.
fn component_row(data: &Entity, overrides: Entity) -> Entity {
    let mut row: Entity = data
        .iter()
        .filter(|(key, _)| key.as_str() != ID_FIELD && key.as_str() != COMPONENT_TYPE_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    row.extend(overrides);
    row
}

fn member_reference(component: &str, id: &EntityId) -> JsonValue {
    json!({ ID_FIELD: id.to_value(), COMPONENT_TYPE_FIELD: component })
}
