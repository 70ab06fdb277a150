// ============================================================================
// Entity Service Library
// ============================================================================

//! Content-type agnostic CRUD over schema-described entities.
//!
//! The crate sits between callers and a store executor. It translates
//! request parameters into store queries, validates write payloads and
//! their relation references, manages the component rows nested inside an
//! entity and emits lifecycle events, all behind a decoratable
//! [`EntityService`].

pub mod config;
pub mod core;
pub mod events;
pub mod nested;
pub mod prelude;
pub mod query;
pub mod schema;
pub mod service;
pub mod store;
pub mod validation;

// Re-export main types for convenience
pub use config::EntityServiceConfig;
pub use core::{Entity, EntityError, EntityId, Result};
pub use events::{BroadcastEventHub, Event, EventHub, EventPayload};
pub use query::{Page, Pagination, PublicationState, Query, QueryParams, transform_params_to_query};
pub use schema::{Attribute, ContentTypeSchema, InMemorySchemaRegistry, SchemaRegistry};
pub use service::{
    Action, EntityDecorator, EntityOperations, EntityOptions, EntityService, FindOutput, OperationInfo,
    ServiceContext,
};
pub use store::{EntityStore, InMemoryStore};
pub use validation::{EntityValidator, SchemaValidator, ValidationOptions};
