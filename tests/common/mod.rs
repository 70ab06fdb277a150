#![allow(dead_code)]

use async_trait::async_trait;
use entity_service::schema::{RelationKind, ScalarType};
use entity_service::{
    Attribute, BroadcastEventHub, ContentTypeSchema, Entity, EntityId, EntityService, EntityServiceConfig,
    EntityStore, InMemorySchemaRegistry, InMemoryStore, Page, Query, Result, SchemaRegistry, SchemaValidator,
    ServiceContext,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub const ARTICLE: &str = "api::article.article";
pub const AUTHOR: &str = "api::author.author";
pub const TAG: &str = "api::tag.tag";
pub const HOMEPAGE: &str = "api::homepage.homepage";
pub const SLIDE: &str = "shared.slide";
pub const HERO: &str = "shared.hero";
pub const QUOTE: &str = "shared.quote";

pub fn registry() -> Arc<dyn SchemaRegistry> {
    Arc::new(
        InMemorySchemaRegistry::new()
            .with(
                ContentTypeSchema::collection(ARTICLE, "article")
                    .attribute("title", Attribute::scalar(ScalarType::String).required())
                    .attribute("views", Attribute::scalar(ScalarType::Integer))
                    .attribute("secret", Attribute::scalar(ScalarType::Password))
                    .attribute("author", Attribute::relation(RelationKind::ManyToOne, AUTHOR))
                    .attribute("tags", Attribute::relation(RelationKind::ManyToMany, TAG))
                    .attribute("slides", Attribute::component(SLIDE, true))
                    .attribute("hero", Attribute::component(HERO, false))
                    .attribute("blocks", Attribute::dynamic_zone([SLIDE, QUOTE])),
            )
            .with(
                ContentTypeSchema::collection(AUTHOR, "author")
                    .attribute("name", Attribute::scalar(ScalarType::String)),
            )
            .with(
                ContentTypeSchema::collection(TAG, "tag")
                    .attribute("name", Attribute::scalar(ScalarType::String)),
            )
            .with(
                ContentTypeSchema::single_type(HOMEPAGE, "homepage")
                    .attribute("headline", Attribute::scalar(ScalarType::String)),
            )
            .with(
                ContentTypeSchema::component(SLIDE, "slide")
                    .attribute("text", Attribute::scalar(ScalarType::String))
                    .attribute("delay", Attribute::scalar(ScalarType::Integer)),
            )
            .with(
                ContentTypeSchema::component(HERO, "hero")
                    .attribute("title", Attribute::scalar(ScalarType::String)),
            )
            .with(
                ContentTypeSchema::component(QUOTE, "quote")
                    .attribute("quote", Attribute::scalar(ScalarType::Text))
                    .attribute("delay", Attribute::scalar(ScalarType::Integer)),
            ),
    )
}

pub struct Harness {
    pub service: EntityService,
    pub store: Arc<InMemoryStore>,
    pub events: BroadcastEventHub,
}

pub fn harness() -> Harness {
    harness_with(EntityServiceConfig::default())
}

pub fn harness_with(config: EntityServiceConfig) -> Harness {
    let registry = registry();
    let store = Arc::new(InMemoryStore::new(registry.clone()));
    let (service, events) = build_service(store.clone(), registry, config);
    Harness { service, store, events }
}

pub fn build_service(
    db: Arc<dyn EntityStore>,
    registry: Arc<dyn SchemaRegistry>,
    config: EntityServiceConfig,
) -> (EntityService, BroadcastEventHub) {
    let events = BroadcastEventHub::default();
    let ctx = ServiceContext::new(
        db,
        registry.clone(),
        Arc::new(SchemaValidator::new(registry)),
        Arc::new(events.clone()),
    )
    .with_config(config);
    (EntityService::new(ctx), events)
}

pub fn entity(value: JsonValue) -> Entity {
    value.as_object().cloned().unwrap_or_default()
}

pub fn id_of(entity: &Entity) -> EntityId {
    EntityId::of(entity).unwrap()
}

pub async fn rows_json(store: &InMemoryStore, uid: &str) -> JsonValue {
    JsonValue::Array(store.rows(uid).await.into_iter().map(JsonValue::Object).collect())
}

/// Store wrapper that holds every `create` for `delay` milliseconds, read
/// from the row being created, before forwarding it.
pub struct DelayedStore {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl EntityStore for DelayedStore {
    async fn find_one(&self, uid: &str, query: &Query) -> Result<Option<Entity>> {
        self.inner.find_one(uid, query).await
    }

    async fn find_many(&self, uid: &str, query: &Query) -> Result<Vec<Entity>> {
        self.inner.find_many(uid, query).await
    }

    async fn find_page(&self, uid: &str, query: &Query) -> Result<Page> {
        self.inner.find_page(uid, query).await
    }

    async fn find_with_count(&self, uid: &str, query: &Query) -> Result<(Vec<Entity>, u64)> {
        self.inner.find_with_count(uid, query).await
    }

    async fn find_with_relation_counts(&self, uid: &str, query: &Query) -> Result<Vec<Entity>> {
        self.inner.find_with_relation_counts(uid, query).await
    }

    async fn count(&self, uid: &str, query: &Query) -> Result<u64> {
        self.inner.count(uid, query).await
    }

    async fn create(&self, uid: &str, query: &Query, data: Entity) -> Result<Entity> {
        if let Some(ms) = data.get("delay").and_then(JsonValue::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.inner.create(uid, query, data).await
    }

    async fn update(&self, uid: &str, query: &Query, data: Entity) -> Result<Option<Entity>> {
        self.inner.update(uid, query, data).await
    }

    async fn delete(&self, uid: &str, query: &Query) -> Result<Option<Entity>> {
        self.inner.delete(uid, query).await
    }

    async fn delete_many(&self, uid: &str, query: &Query) -> Result<u64> {
        self.inner.delete_many(uid, query).await
    }

    async fn load(&self, uid: &str, id: &EntityId, attribute: &str) -> Result<JsonValue> {
        self.inner.load(uid, id, attribute).await
    }
}
