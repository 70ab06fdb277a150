use super::{EntityOperations, EntityOptions, FindOutput, OperationInfo};
use crate::core::{Entity, EntityId, Result};
use crate::query::Page;
use async_trait::async_trait;
use std::sync::Arc;

/// A partial override of the operation table.
///
/// Every method receives the table it is layered over as `inner` and
/// forwards to it unless overridden, so a decorator only implements the
/// operations it changes. `inner` is the table as it was when the
/// decorator was applied; calls that must reach the final stack (such as
/// lifecycle events emitted by the default writes) are late-bound by the
/// service itself.
#[async_trait]
pub trait EntityDecorator: Send + Sync {
    async fn wrap_options(
        &self,
        inner: &dyn EntityOperations,
        options: EntityOptions,
        info: OperationInfo,
    ) -> Result<EntityOptions> {
        inner.wrap_options(options, info).await
    }

    async fn emit_event(&self, inner: &dyn EntityOperations, event: &str, uid: &str, entity: &Entity) -> Result<()> {
        inner.emit_event(event, uid, entity).await
    }

    async fn find(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<FindOutput> {
        inner.find(uid, options).await
    }

    async fn find_page(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<Page> {
        inner.find_page(uid, options).await
    }

    async fn find_with_relation_counts(
        &self,
        inner: &dyn EntityOperations,
        uid: &str,
        options: EntityOptions,
    ) -> Result<Vec<Entity>> {
        inner.find_with_relation_counts(uid, options).await
    }

    async fn find_one(
        &self,
        inner: &dyn EntityOperations,
        uid: &str,
        id: &EntityId,
        options: EntityOptions,
    ) -> Result<Option<Entity>> {
        inner.find_one(uid, id, options).await
    }

    async fn count(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<u64> {
        inner.count(uid, options).await
    }

    async fn create(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<Entity> {
        inner.create(uid, options).await
    }

    async fn update(
        &self,
        inner: &dyn EntityOperations,
        uid: &str,
        id: &EntityId,
        options: EntityOptions,
    ) -> Result<Entity> {
        inner.update(uid, id, options).await
    }

    async fn delete(
        &self,
        inner: &dyn EntityOperations,
        uid: &str,
        id: &EntityId,
        options: EntityOptions,
    ) -> Result<Entity> {
        inner.delete(uid, id, options).await
    }

    async fn delete_many(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<u64> {
        inner.delete_many(uid, options).await
    }

    async fn search(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        inner.search(uid, options).await
    }

    async fn search_with_relation_counts(
        &self,
        inner: &dyn EntityOperations,
        uid: &str,
        options: EntityOptions,
    ) -> Result<Vec<Entity>> {
        inner.search_with_relation_counts(uid, options).await
    }

    async fn search_page(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<Page> {
        inner.search_page(uid, options).await
    }

    async fn count_search(&self, inner: &dyn EntityOperations, uid: &str, options: EntityOptions) -> Result<u64> {
        inner.count_search(uid, options).await
    }
}

/// An operation table with one decorator layered over another table.
pub struct Decorated {
    inner: Arc<dyn EntityOperations>,
    decorator: Arc<dyn EntityDecorator>,
}

impl Decorated {
    pub fn new(inner: Arc<dyn EntityOperations>, decorator: Arc<dyn EntityDecorator>) -> Self {
        Self { inner, decorator }
    }
}

#[async_trait]
impl EntityOperations for Decorated {
    async fn wrap_options(&self, options: EntityOptions, info: OperationInfo) -> Result<EntityOptions> {
        self.decorator.wrap_options(&*self.inner, options, info).await
    }

    async fn emit_event(&self, event: &str, uid: &str, entity: &Entity) -> Result<()> {
        self.decorator.emit_event(&*self.inner, event, uid, entity).await
    }

    async fn find(&self, uid: &str, options: EntityOptions) -> Result<FindOutput> {
        self.decorator.find(&*self.inner, uid, options).await
    }

    async fn find_page(&self, uid: &str, options: EntityOptions) -> Result<Page> {
        self.decorator.find_page(&*self.inner, uid, options).await
    }

    async fn find_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        self.decorator.find_with_relation_counts(&*self.inner, uid, options).await
    }

    async fn find_one(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Option<Entity>> {
        self.decorator.find_one(&*self.inner, uid, id, options).await
    }

    async fn count(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        self.decorator.count(&*self.inner, uid, options).await
    }

    async fn create(&self, uid: &str, options: EntityOptions) -> Result<Entity> {
        self.decorator.create(&*self.inner, uid, options).await
    }

    async fn update(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity> {
        self.decorator.update(&*self.inner, uid, id, options).await
    }

    async fn delete(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity> {
        self.decorator.delete(&*self.inner, uid, id, options).await
    }

    async fn delete_many(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        self.decorator.delete_many(&*self.inner, uid, options).await
    }

    async fn search(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        self.decorator.search(&*self.inner, uid, options).await
    }

    async fn search_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        self.decorator.search_with_relation_counts(&*self.inner, uid, options).await
    }

    async fn search_page(&self, uid: &str, options: EntityOptions) -> Result<Page> {
        self.decorator.search_page(&*self.inner, uid, options).await
    }

    async fn count_search(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        self.decorator.count_search(&*self.inner, uid, options).await
    }
}
