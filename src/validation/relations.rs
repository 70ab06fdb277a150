use crate::core::{COMPONENT_TYPE_FIELD, Entity, EntityError, EntityId, ID_FIELD, Result};
use crate::query::Query;
use crate::schema::{AttributeKind, SchemaRegistry};
use crate::store::EntityStore;
use futures::future::try_join_all;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{Level, event};

/// Referenced ids per target content type, deduplicated.
pub type RelationReferences = BTreeMap<String, BTreeSet<EntityId>>;

/// Fail when any relation referenced by `data` (directly or through nested
/// components and dynamic zones) points at a missing row.
///
/// Issues one existence query per distinct target type, all concurrently.
pub async fn check_relations_exist(
    data: &Entity,
    uid: &str,
    store: &dyn EntityStore,
    registry: &dyn SchemaRegistry,
) -> Result<()> {
    let references = collect_relation_references(data, uid, registry);
    if references.is_empty() {
        return Ok(());
    }

    let checks = references
        .iter()
        .map(|(target, ids)| check_target(store, target, ids));
    try_join_all(checks).await?;

    Ok(())
}

/// Schema-guided walk collecting every relation reference of a payload.
/// Unknown models contribute nothing.
pub fn collect_relation_references(
    data: &Entity,
    uid: &str,
    registry: &dyn SchemaRegistry,
) -> RelationReferences {
    let mut references = RelationReferences::new();
    collect_into(data, uid, registry, &mut references);
    references
}

fn collect_into(data: &Entity, uid: &str, registry: &dyn SchemaRegistry, out: &mut RelationReferences) {
    let Some(model) = registry.get_model(uid) else {
        return;
    };

    for (name, attribute) in &model.attributes {
        let Some(value) = data.get(name).filter(|v| !v.is_null()) else {
            continue;
        };

        match &attribute.kind {
            AttributeKind::Relation { target, .. } => {
                let ids = referenced_ids(value);
                if !ids.is_empty() {
                    out.entry(target.clone()).or_default().extend(ids);
                }
            }
            AttributeKind::Component { component, .. } => {
                let items = match value {
                    JsonValue::Array(items) => items.iter().collect(),
                    single => vec![single],
                };
                for item in items {
                    if let JsonValue::Object(nested) = item {
                        collect_into(nested, component, registry, out);
                    }
                }
            }
            AttributeKind::DynamicZone { .. } => {
                for item in value.as_array().into_iter().flatten() {
                    if let JsonValue::Object(nested) = item
                        && let Some(component) = nested.get(COMPONENT_TYPE_FIELD).and_then(JsonValue::as_str)
                    {
                        collect_into(nested, component, registry, out);
                    }
                }
            }
            AttributeKind::Media { .. } | AttributeKind::Scalar(_) => {}
        }
    }
}

/// Ids named by a relation value: a bare id, a list of ids or `{id}`
/// objects, or the `connect` and `set` lists of an envelope.
fn referenced_ids(value: &JsonValue) -> Vec<EntityId> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(EntityId::from_reference).collect(),
        JsonValue::Object(envelope) if !envelope.contains_key(ID_FIELD) => ["connect", "set"]
            .iter()
            .filter_map(|key| envelope.get(*key))
            .flat_map(referenced_ids)
            .collect(),
        other => EntityId::from_reference(other).into_iter().collect(),
    }
}

async fn check_target(store: &dyn EntityStore, target: &str, ids: &BTreeSet<EntityId>) -> Result<()> {
    let query = Query {
        select: Some(vec![ID_FIELD.to_string()]),
        ..Query::by_ids(ids)
    };
    let (rows, count) = store.query(target).find_with_count(&query).await?;

    if count == ids.len() as u64 {
        return Ok(());
    }

    let found: BTreeSet<EntityId> = rows.iter().filter_map(EntityId::of).collect();
    let missing: Vec<EntityId> = ids.difference(&found).cloned().collect();
    event!(
        Level::WARN,
        target_type = %target,
        missing = missing.len(),
        "relation references missing rows"
    );

    Err(EntityError::RelationNotFound {
        target: target.to_string(),
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, ContentTypeSchema, InMemorySchemaRegistry, RelationKind};
    use crate::store::{InMemoryStore, StoreOperation};
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Arc<InMemorySchemaRegistry> {
        Arc::new(
            InMemorySchemaRegistry::new()
                .with(
                    ContentTypeSchema::collection("api::post.post", "post")
                        .attribute("author", Attribute::relation(RelationKind::ManyToOne, "api::author.author"))
                        .attribute("tags", Attribute::relation(RelationKind::ManyToMany, "api::tag.tag"))
                        .attribute("seo", Attribute::component("shared.seo", false))
                        .attribute("blocks", Attribute::dynamic_zone(["blocks.related"])),
                )
                .with(
                    ContentTypeSchema::component("shared.seo", "seo")
                        .attribute("tags", Attribute::relation(RelationKind::OneToMany, "api::tag.tag")),
                )
                .with(
                    ContentTypeSchema::component("blocks.related", "related")
                        .attribute("author", Attribute::relation(RelationKind::OneToOne, "api::author.author")),
                )
                .with(ContentTypeSchema::collection("api::author.author", "author"))
                .with(ContentTypeSchema::collection("api::tag.tag", "tag")),
        )
    }

    async fn seeded() -> (Arc<InMemoryStore>, Arc<InMemorySchemaRegistry>) {
        let registry = registry();
        let store = Arc::new(InMemoryStore::new(registry.clone()));
        let q = Query::new();
        for _ in 0..3 {
            store.create("api::tag.tag", &q, Entity::new()).await.unwrap();
            store.create("api::author.author", &q, Entity::new()).await.unwrap();
        }
        store.clear_calls();
        (store, registry)
    }

    fn payload(value: JsonValue) -> Entity {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_collects_across_nested_structures() {
        let registry = registry();
        let data = payload(json!({
            "author": 1,
            "tags": {"connect": [{"id": 2}], "set": [3], "disconnect": [9]},
            "seo": {"tags": [2, "3"]},
            "blocks": [{"__component": "blocks.related", "author": {"id": 2}}]
        }));

        let refs = collect_relation_references(&data, "api::post.post", &*registry);

        let authors: Vec<_> = refs["api::author.author"].iter().cloned().collect();
        let tags: Vec<_> = refs["api::tag.tag"].iter().cloned().collect();
        assert_eq!(authors, vec![EntityId::Int(1), EntityId::Int(2)]);
        assert_eq!(tags, vec![EntityId::Int(2), EntityId::Int(3)]);
    }

    #[test]
    fn test_unknown_model_collects_nothing() {
        let registry = registry();
        let refs = collect_relation_references(&payload(json!({"author": 1})), "api::nope.nope", &*registry);
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn test_one_query_per_target_type() {
        let (store, registry) = seeded().await;
        let data = payload(json!({
            "author": 1,
            "tags": [1, 2, 2, 3],
            "seo": {"tags": [1]},
            "blocks": [
                {"__component": "blocks.related", "author": 2},
                {"__component": "blocks.related", "author": 3}
            ]
        }));

        check_relations_exist(&data, "api::post.post", &*store, &*registry)
            .await
            .unwrap();

        assert_eq!(store.calls_for(StoreOperation::FindWithCount).len(), 2);
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_ids_are_reported() {
        let (store, registry) = seeded().await;
        let data = payload(json!({"tags": {"connect": [1, 42, 7]}}));

        let err = check_relations_exist(&data, "api::post.post", &*store, &*registry)
            .await
            .unwrap_err();

        match err {
            EntityError::RelationNotFound { target, missing } => {
                assert_eq!(target, "api::tag.tag");
                assert_eq!(missing, vec![EntityId::Int(7), EntityId::Int(42)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payload_without_relations_issues_no_queries() {
        let (store, registry) = seeded().await;
        let data = payload(json!({"title": "x", "author": null}));

        check_relations_exist(&data, "api::post.post", &*store, &*registry)
            .await
            .unwrap();
        assert!(store.calls().is_empty());
    }
}
