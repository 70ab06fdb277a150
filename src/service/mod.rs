//! Entity service façade
//!
//! [`EntityService`] is the entry point of the crate. Every public method
//! runs the caller's options through the live `wrap_options` hook and then
//! forwards to the live operation table, which is either the default
//! implementation or a stack of [`EntityDecorator`]s layered over it with
//! [`EntityService::decorate`].

mod context;
mod decorator;
mod default;

pub use context::ServiceContext;
pub use decorator::{Decorated, EntityDecorator};
pub use default::DefaultEntityOperations;

use crate::core::{Entity, EntityId, Result};
use crate::query::{Page, QueryParams};
use async_trait::async_trait;
use default::LiveOperations;
use serde_json::Value as JsonValue;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

// ============================================================================
// OPTIONS
// ============================================================================

/// Per-call options: request parameters, the write payload and any staged
/// files (left for `wrap_options` overrides to handle).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityOptions {
    pub params: QueryParams,
    pub data: Option<Entity>,
    pub files: Option<JsonValue>,
}

impl EntityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn data(mut self, data: Entity) -> Self {
        self.data = Some(data);
        self
    }

    pub fn files(mut self, files: JsonValue) -> Self {
        self.files = Some(files);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Find,
    FindPage,
    FindWithRelationCounts,
    FindOne,
    Count,
    Create,
    Update,
    Delete,
    DeleteMany,
    Search,
    SearchWithRelationCounts,
    SearchPage,
    CountSearch,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::FindPage => "findPage",
            Self::FindWithRelationCounts => "findWithRelationCounts",
            Self::FindOne => "findOne",
            Self::Count => "count",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
            Self::Search => "search",
            Self::SearchWithRelationCounts => "searchWithRelationCounts",
            Self::SearchPage => "searchPage",
            Self::CountSearch => "countSearch",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `wrap_options` is wrapping options for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    pub uid: String,
    pub action: Action,
}

impl OperationInfo {
    pub fn new(uid: impl Into<String>, action: Action) -> Self {
        Self {
            uid: uid.into(),
            action,
        }
    }
}

/// Result of `find`: a list for collection types, the sole row (if any)
/// for single types.
#[derive(Debug, Clone, PartialEq)]
pub enum FindOutput {
    Collection(Vec<Entity>),
    Single(Option<Entity>),
}

impl FindOutput {
    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            Self::Collection(entities) => entities,
            Self::Single(entity) => entity.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Collection(entities) => entities.len(),
            Self::Single(entity) => usize::from(entity.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// OPERATION TABLE
// ============================================================================

/// The operation set of the entity service.
#[async_trait]
pub trait EntityOperations: Send + Sync {
    /// Pre-processing hook applied to the options of every operation.
    async fn wrap_options(&self, options: EntityOptions, info: OperationInfo) -> Result<EntityOptions> {
        let _ = info;
        Ok(options)
    }

    /// Publish a lifecycle event for `entity`.
    async fn emit_event(&self, event: &str, uid: &str, entity: &Entity) -> Result<()>;

    async fn find(&self, uid: &str, options: EntityOptions) -> Result<FindOutput>;

    async fn find_page(&self, uid: &str, options: EntityOptions) -> Result<Page>;

    async fn find_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>>;

    async fn find_one(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Option<Entity>>;

    async fn count(&self, uid: &str, options: EntityOptions) -> Result<u64>;

    async fn create(&self, uid: &str, options: EntityOptions) -> Result<Entity>;

    async fn update(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity>;

    async fn delete(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity>;

    /// Delete every entity matching the params; returns how many went.
    async fn delete_many(&self, uid: &str, options: EntityOptions) -> Result<u64>;

    async fn search(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>>;

    async fn search_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>>;

    async fn search_page(&self, uid: &str, options: EntityOptions) -> Result<Page>;

    async fn count_search(&self, uid: &str, options: EntityOptions) -> Result<u64>;
}

// ============================================================================
// FAÇADE
// ============================================================================

/// Entity service over one store, schema registry, validator and event hub.
///
/// # Examples
///
/// ```
/// use entity_service::prelude::service::*;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let registry = Arc::new(InMemorySchemaRegistry::new().with(
///     ContentTypeSchema::collection("api::note.note", "note")
///         .attribute("text", Attribute::scalar(ScalarType::Text)),
/// ));
/// let ctx = ServiceContext::new(
///     Arc::new(InMemoryStore::new(registry.clone())),
///     registry.clone(),
///     Arc::new(SchemaValidator::new(registry)),
///     Arc::new(BroadcastEventHub::default()),
/// );
/// let service = EntityService::new(ctx);
///
/// let data = json!({"text": "hello"}).as_object().cloned().unwrap_or_default();
/// let note = service
///     .create("api::note.note", EntityOptions::new().data(data))
///     .await?;
/// assert_eq!(note.get("id"), Some(&json!(1)));
/// # Ok::<(), EntityError>(())
/// # }).unwrap();
/// ```
pub struct EntityService {
    implementation: Arc<dyn EntityOperations>,
    live: LiveOperations,
}

impl EntityService {
    pub fn new(ctx: ServiceContext) -> Self {
        let live = LiveOperations::default();
        let implementation: Arc<dyn EntityOperations> =
            Arc::new(DefaultEntityOperations::new(ctx, live.clone()));
        live.set(&implementation);
        Self { implementation, live }
    }

    /// Layer `decorator` over the current operation table. Operations it
    /// does not override keep their current behavior.
    pub fn decorate(mut self, decorator: impl EntityDecorator + 'static) -> Self {
        self.implementation = Arc::new(Decorated::new(self.implementation, Arc::new(decorator)));
        self.live.set(&self.implementation);
        self
    }

    /// The live operation table.
    pub fn implementation(&self) -> Arc<dyn EntityOperations> {
        self.implementation.clone()
    }

    async fn dispatch<T, F, Fut>(&self, uid: &str, action: Action, options: EntityOptions, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn EntityOperations>, EntityOptions) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = info_span!("entity.operation", uid = %uid, action = %action);
        let implementation = self.implementation.clone();

        async move {
            let options = implementation
                .wrap_options(options, OperationInfo::new(uid, action))
                .await?;
            let result = op(implementation, options).await;
            match &result {
                Ok(_) => event!(Level::DEBUG, "entity operation completed"),
                Err(err) => event!(Level::WARN, error = %err, "entity operation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    pub async fn emit_event(&self, event: &str, uid: &str, entity: &Entity) -> Result<()> {
        self.implementation.emit_event(event, uid, entity).await
    }

    pub async fn find(&self, uid: &str, options: EntityOptions) -> Result<FindOutput> {
        self.dispatch(uid, Action::Find, options, |ops, options| async move {
            ops.find(uid, options).await
        })
        .await
    }

    pub async fn find_page(&self, uid: &str, options: EntityOptions) -> Result<Page> {
        self.dispatch(uid, Action::FindPage, options, |ops, options| async move {
            ops.find_page(uid, options).await
        })
        .await
    }

    pub async fn find_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        self.dispatch(uid, Action::FindWithRelationCounts, options, |ops, options| async move {
            ops.find_with_relation_counts(uid, options).await
        })
        .await
    }

    pub async fn find_one(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Option<Entity>> {
        self.dispatch(uid, Action::FindOne, options, |ops, options| async move {
            ops.find_one(uid, id, options).await
        })
        .await
    }

    pub async fn count(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        self.dispatch(uid, Action::Count, options, |ops, options| async move {
            ops.count(uid, options).await
        })
        .await
    }

    pub async fn create(&self, uid: &str, options: EntityOptions) -> Result<Entity> {
        self.dispatch(uid, Action::Create, options, |ops, options| async move {
            ops.create(uid, options).await
        })
        .await
    }

    pub async fn update(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity> {
        self.dispatch(uid, Action::Update, options, |ops, options| async move {
            ops.update(uid, id, options).await
        })
        .await
    }

    pub async fn delete(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity> {
        self.dispatch(uid, Action::Delete, options, |ops, options| async move {
            ops.delete(uid, id, options).await
        })
        .await
    }

    pub async fn delete_many(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        self.dispatch(uid, Action::DeleteMany, options, |ops, options| async move {
            ops.delete_many(uid, options).await
        })
        .await
    }

    pub async fn search(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        self.dispatch(uid, Action::Search, options, |ops, options| async move {
            ops.search(uid, options).await
        })
        .await
    }

    pub async fn search_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        self.dispatch(uid, Action::SearchWithRelationCounts, options, |ops, options| async move {
            ops.search_with_relation_counts(uid, options).await
        })
        .await
    }

    pub async fn search_page(&self, uid: &str, options: EntityOptions) -> Result<Page> {
        self.dispatch(uid, Action::SearchPage, options, |ops, options| async move {
            ops.search_page(uid, options).await
        })
        .await
    }

    pub async fn count_search(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        self.dispatch(uid, Action::CountSearch, options, |ops, options| async move {
            ops.count_search(uid, options).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_names() {
        assert_eq!(Action::FindWithRelationCounts.as_str(), "findWithRelationCounts");
        assert_eq!(Action::DeleteMany.to_string(), "deleteMany");
        assert_eq!(OperationInfo::new("api::a.a", Action::Count).action, Action::Count);
    }

    #[test]
    fn test_find_output_flattens() {
        let row = json!({"id": 1}).as_object().unwrap().clone();

        let single = FindOutput::Single(Some(row.clone()));
        assert_eq!(single.len(), 1);
        assert_eq!(single.into_entities(), vec![row.clone()]);

        assert!(FindOutput::Single(None).is_empty());
        assert_eq!(FindOutput::Collection(vec![row.clone(), row]).len(), 2);
    }
}
