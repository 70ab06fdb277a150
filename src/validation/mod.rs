//! Write-path validation
//!
//! Two independent checks run before anything is persisted: the field
//! validator sanitizes the payload against the schema, and the relation
//! check makes sure every referenced row exists.

mod entity;
mod relations;

pub use entity::{EntityValidator, SchemaValidator, ValidationOptions};
pub use relations::{RelationReferences, check_relations_exist, collect_relation_references};
