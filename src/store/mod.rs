//! Store executor contract
//!
//! The core never talks to a database directly. Every read and write goes
//! through [`EntityStore`], keyed by content-type uid and driven by the
//! [`Query`] object produced by the query translator. `store.query(uid)`
//! returns a [`ModelQuery`] handle bound to one content type.

mod filter;
mod memory;

pub use filter::{compare_values, matches_filter};
pub use memory::{InMemoryStore, StoreCall, StoreOperation};

use crate::core::{Entity, EntityId, Result};
use crate::query::{Page, Query};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_one(&self, uid: &str, query: &Query) -> Result<Option<Entity>>;

    async fn find_many(&self, uid: &str, query: &Query) -> Result<Vec<Entity>>;

    async fn find_page(&self, uid: &str, query: &Query) -> Result<Page>;

    /// Rows in the query window plus the total number of rows matching the
    /// filter (ignoring the window).
    async fn find_with_count(&self, uid: &str, query: &Query) -> Result<(Vec<Entity>, u64)>;

    /// Like `find_many`, with to-many relations replaced by `{ "count": n }`.
    async fn find_with_relation_counts(&self, uid: &str, query: &Query) -> Result<Vec<Entity>>;

    async fn count(&self, uid: &str, query: &Query) -> Result<u64>;

    async fn create(&self, uid: &str, query: &Query, data: Entity) -> Result<Entity>;

    /// Update the first row matching `query`; `None` when nothing matched.
    async fn update(&self, uid: &str, query: &Query, data: Entity) -> Result<Option<Entity>>;

    /// Delete the first row matching `query`, returning it.
    async fn delete(&self, uid: &str, query: &Query) -> Result<Option<Entity>>;

    async fn delete_many(&self, uid: &str, query: &Query) -> Result<u64>;

    /// Lazily load one relation, component or dynamic-zone attribute of a
    /// row, populated. `Null` when the attribute is unset.
    async fn load(&self, uid: &str, id: &EntityId, attribute: &str) -> Result<JsonValue>;
}

impl<'s> dyn EntityStore + 's {
    /// Bind this store to one content type.
    pub fn query<'a>(&'a self, uid: &'a str) -> ModelQuery<'a> {
        ModelQuery { store: self, uid }
    }
}

/// Store operations for a single content type.
pub struct ModelQuery<'a> {
    store: &'a dyn EntityStore,
    uid: &'a str,
}

impl ModelQuery<'_> {
    pub async fn find_one(&self, query: &Query) -> Result<Option<Entity>> {
        self.store.find_one(self.uid, query).await
    }

    pub async fn find_many(&self, query: &Query) -> Result<Vec<Entity>> {
        self.store.find_many(self.uid, query).await
    }

    pub async fn find_page(&self, query: &Query) -> Result<Page> {
        self.store.find_page(self.uid, query).await
    }

    pub async fn find_with_count(&self, query: &Query) -> Result<(Vec<Entity>, u64)> {
        self.store.find_with_count(self.uid, query).await
    }

    pub async fn find_with_relation_counts(&self, query: &Query) -> Result<Vec<Entity>> {
        self.store.find_with_relation_counts(self.uid, query).await
    }

    pub async fn count(&self, query: &Query) -> Result<u64> {
        self.store.count(self.uid, query).await
    }

    pub async fn create(&self, query: &Query, data: Entity) -> Result<Entity> {
        self.store.create(self.uid, query, data).await
    }

    pub async fn update(&self, query: &Query, data: Entity) -> Result<Option<Entity>> {
        self.store.update(self.uid, query, data).await
    }

    pub async fn delete(&self, query: &Query) -> Result<Option<Entity>> {
        self.store.delete(self.uid, query).await
    }

    pub async fn delete_many(&self, query: &Query) -> Result<u64> {
        self.store.delete_many(self.uid, query).await
    }

    pub async fn load(&self, id: &EntityId, attribute: &str) -> Result<JsonValue> {
        self.store.load(self.uid, id, attribute).await
    }
}
