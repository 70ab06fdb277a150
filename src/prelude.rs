//! Recommended imports grouped by role.
//!
//! `service` is what application code needs to build and call an entity
//! service. `extension` adds the seams for custom stores, validators,
//! event hubs and decorators.

pub mod service {
    //! Building and calling the service.
    pub use crate::{
        Attribute, ContentTypeSchema, Entity, EntityError, EntityId, EntityOptions, EntityService,
        EntityServiceConfig, FindOutput, InMemorySchemaRegistry, InMemoryStore, QueryParams, Result,
        SchemaValidator, ServiceContext,
    };
    pub use crate::events::BroadcastEventHub;
    pub use crate::schema::{RelationKind, ScalarType};
}

pub mod extension {
    //! Seams for replacing collaborators or overriding operations.
    pub use crate::service::{Action, Decorated, EntityDecorator, EntityOperations, OperationInfo};
    pub use crate::{EntityStore, EntityValidator, EventHub, EventPayload, Query, SchemaRegistry, ValidationOptions};
}
