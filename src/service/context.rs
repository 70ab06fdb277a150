use crate::config::EntityServiceConfig;
use crate::events::EventHub;
use crate::schema::SchemaRegistry;
use crate::store::EntityStore;
use crate::validation::EntityValidator;
use std::sync::Arc;

/// Collaborators of the entity service, handed over at construction.
#[derive(Clone)]
pub struct ServiceContext {
    pub db: Arc<dyn EntityStore>,
    pub registry: Arc<dyn SchemaRegistry>,
    pub validator: Arc<dyn EntityValidator>,
    pub event_hub: Arc<dyn EventHub>,
    pub config: EntityServiceConfig,
}

impl ServiceContext {
    pub fn new(
        db: Arc<dyn EntityStore>,
        registry: Arc<dyn SchemaRegistry>,
        validator: Arc<dyn EntityValidator>,
        event_hub: Arc<dyn EventHub>,
    ) -> Self {
        Self {
            db,
            registry,
            validator,
            event_hub,
            config: EntityServiceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EntityServiceConfig) -> Self {
        self.config = config;
        self
    }
}
