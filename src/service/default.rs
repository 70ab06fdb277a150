use super::{EntityOperations, EntityOptions, FindOutput, ServiceContext};
use crate::core::{Entity, EntityError, EntityId, ID_FIELD, Result};
use crate::events::{ENTRY_CREATE, ENTRY_DELETE, ENTRY_UPDATE, EventPayload, sanitize_entity};
use crate::nested::NestedStructureManager;
use crate::query::{Page, Query, QueryParams, transform_params_to_query};
use crate::schema::ContentTypeSchema;
use crate::validation::{ValidationOptions, check_relations_exist};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{Level, event};

/// Late-bound handle on the façade's current operation table, so that the
/// default operations emit events through any decorated `emit_event`.
#[derive(Clone, Default)]
pub(crate) struct LiveOperations(Arc<RwLock<Option<Weak<dyn EntityOperations>>>>);

impl LiveOperations {
    /// Point the handle at `operations`. The slot only holds a pointer, so
    /// overwriting it also clears a poisoned lock.
    pub(crate) fn set(&self, operations: &Arc<dyn EntityOperations>) {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::downgrade(operations));
        drop(slot);
        self.0.clear_poison();
    }

    fn get(&self) -> Result<Option<Arc<dyn EntityOperations>>> {
        Ok(self.0.read()?.as_ref().and_then(Weak::upgrade))
    }
}

/// Default operation table: validation, relation checks, nested structures,
/// the primary row and the lifecycle event, in that order.
pub struct DefaultEntityOperations {
    ctx: ServiceContext,
    nested: NestedStructureManager,
    live: LiveOperations,
}

impl DefaultEntityOperations {
    pub(crate) fn new(ctx: ServiceContext, live: LiveOperations) -> Self {
        let nested = NestedStructureManager::new(ctx.db.clone(), ctx.registry.clone(), ctx.config.clone());
        Self { ctx, nested, live }
    }

    fn model(&self, uid: &str) -> Result<Arc<ContentTypeSchema>> {
        self.ctx
            .registry
            .get_model(uid)
            .ok_or_else(|| EntityError::ModelNotFound(uid.to_string()))
    }

    fn to_query(&self, model: &ContentTypeSchema, params: &QueryParams) -> Result<Query> {
        transform_params_to_query(model, params, &self.ctx.config)
    }

    async fn emit(&self, event: &str, uid: &str, entity: &Entity) -> Result<()> {
        match self.live.get()? {
            Some(live) => live.emit_event(event, uid, entity).await,
            None => self.emit_event(event, uid, entity).await,
        }
    }

    /// Emit after a committed write. The rows are already stored, so a
    /// failing emitter is logged and never fails the write.
    async fn announce(&self, event: &str, uid: &str, entity: &Entity) {
        if let Err(err) = self.emit(event, uid, entity).await {
            event!(Level::WARN, event = %event, uid = %uid, error = %err, "event emission failed");
        }
    }
}

#[async_trait]
impl EntityOperations for DefaultEntityOperations {
    async fn emit_event(&self, event: &str, uid: &str, entity: &Entity) -> Result<()> {
        let model = self.model(uid)?;
        let entry = sanitize_entity(entity.clone(), &model, &*self.ctx.registry);
        self.ctx.event_hub.emit(
            event,
            EventPayload {
                model: model.model_name.clone(),
                entry,
            },
        );
        Ok(())
    }

    async fn find(&self, uid: &str, options: EntityOptions) -> Result<FindOutput> {
        let model = self.model(uid)?;
        let query = self.to_query(&model, &options.params)?;

        if model.is_single_type() {
            let entity = self.ctx.db.query(uid).find_one(&Query::new()).await?;
            return Ok(FindOutput::Single(entity));
        }

        Ok(FindOutput::Collection(self.ctx.db.query(uid).find_many(&query).await?))
    }

    async fn find_page(&self, uid: &str, options: EntityOptions) -> Result<Page> {
        let model = self.model(uid)?;
        let mut query = self.to_query(&model, &options.params)?;
        if query.page_size.is_none() && query.limit.is_none() {
            query.page_size = Some(self.ctx.config.default_page_size);
        }
        self.ctx.db.query(uid).find_page(&query).await
    }

    async fn find_with_relation_counts(&self, uid: &str, options: EntityOptions) -> Result<Vec<Entity>> {
        let model = self.model(uid)?;
        let query = self.to_query(&model, &options.params)?;
        self.ctx.db.query(uid).find_with_relation_counts(&query).await
    }

    async fn find_one(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Option<Entity>> {
        let model = self.model(uid)?;
        let query = self.to_query(&model, &options.params.selection())?.with_id(id);
        self.ctx.db.query(uid).find_one(&query).await
    }

    async fn count(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        let model = self.model(uid)?;
        let query = self.to_query(&model, &options.params)?;
        self.ctx.db.query(uid).count(&query).await
    }

    async fn create(&self, uid: &str, options: EntityOptions) -> Result<Entity> {
        let model = self.model(uid)?;
        let data = options.data.unwrap_or_default();
        let is_draft = model.is_draft(&data);

        let valid = self
            .ctx
            .validator
            .validate_entity_creation(&model, data, ValidationOptions::draft(is_draft))
            .await?;
        check_relations_exist(&valid, uid, &*self.ctx.db, &*self.ctx.registry).await?;

        let query = self.to_query(&model, &options.params.selection())?;

        let component_data = self.nested.create_components(uid, &valid).await?;
        let mut row = valid;
        row.extend(component_data);

        let entity = self.ctx.db.query(uid).create(&query, row).await?;
        event!(Level::DEBUG, uid = %uid, draft = is_draft, "entity created");

        self.announce(ENTRY_CREATE, uid, &entity).await;
        Ok(entity)
    }

    async fn update(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity> {
        let model = self.model(uid)?;

        let existing = self
            .ctx
            .db
            .query(uid)
            .find_one(&Query::by_id(id))
            .await?
            .ok_or_else(|| EntityError::not_found(uid, id))?;
        let is_draft = model.is_draft(&existing);

        let valid = self
            .ctx
            .validator
            .validate_entity_update(&model, options.data.unwrap_or_default(), ValidationOptions::draft(is_draft))
            .await?;
        check_relations_exist(&valid, uid, &*self.ctx.db, &*self.ctx.registry).await?;

        let query = self.to_query(&model, &options.params.selection())?.with_id(id);

        let component_data = self.nested.update_components(uid, id, &valid).await?;
        let mut row = valid;
        row.extend(component_data);

        let entity = self
            .ctx
            .db
            .query(uid)
            .update(&query, row)
            .await?
            .ok_or_else(|| EntityError::not_found(uid, id))?;
        event!(Level::DEBUG, uid = %uid, id = %id, "entity updated");

        self.announce(ENTRY_UPDATE, uid, &entity).await;
        Ok(entity)
    }

    async fn delete(&self, uid: &str, id: &EntityId, options: EntityOptions) -> Result<Entity> {
        let model = self.model(uid)?;
        let query = self.to_query(&model, &options.params.selection())?.with_id(id);

        let entity = self
            .ctx
            .db
            .query(uid)
            .find_one(&query)
            .await?
            .ok_or_else(|| EntityError::not_found(uid, id))?;

        self.nested.delete_components(uid, id).await?;
        self.ctx.db.query(uid).delete(&Query::by_id(id)).await?;
        event!(Level::DEBUG, uid = %uid, id = %id, "entity deleted");

        self.announce(ENTRY_DELETE, uid, &entity).await;
        Ok(entity)
    }

    async fn delete_many(&self, uid: &str, options: EntityOptions) -> Result<u64> {
        let model = self.model(uid)?;
        let query = self.to_query(&model, &options.params)?;

        let matched = self
            .ctx
            .db
            .query(uid)
            .find_many(&Query {
                select: Some(vec![ID_FIELD.to_string()]),
                populate: Vec::new(),
                ..query
            })
            .await?;
        let ids: Vec<EntityId> = matched.iter().filter_map(EntityId::of).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        try_join_all(ids.iter().map(|id| self.nested.delete_components(uid, id))).await?;
        let deleted = self.ctx.db.query(uid).delete_many(&Query::by_ids(&ids)).await?;
        event!(Level::DEBUG, uid = %uid, deleted, "entities deleted");

        Ok(deleted)
    }

    async fn search(&self, _uid: &str, _options: EntityOptions) -> Result<Vec<Entity>> {
        Ok(Vec::new())
    }

    async fn search_with_relation_counts(&self, _uid: &str, _options: EntityOptions) -> Result<Vec<Entity>> {
        Ok(Vec::new())
    }

    async fn search_page(&self, _uid: &str, _options: EntityOptions) -> Result<Page> {
        Ok(Page::empty())
    }

    async fn count_search(&self, _uid: &str, _options: EntityOptions) -> Result<u64> {
        Ok(0)
    }
}
