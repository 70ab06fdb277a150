pub mod error;
pub mod types;

pub use error::{EntityError, Result};
pub use types::{COMPONENT_TYPE_FIELD, Entity, EntityId, ID_FIELD, PUBLISHED_AT_FIELD};
