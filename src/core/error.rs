use super::EntityId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Invalid query parameter: {0}")]
    InvalidParams(String),

    #[error("Invalid payload shape: {0}")]
    Shape(String),

    #[error(
        "A relation associated with this entity does not exist (target '{target}', missing ids: {})",
        format_ids(.missing)
    )]
    RelationNotFound {
        target: String,
        missing: Vec<EntityId>,
    },

    #[error("Entity not found: '{uid}' with id {id}")]
    NotFound { uid: String, id: EntityId },

    #[error("Validation error at '{path}': {message}")]
    Validation { path: String, message: String },

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl EntityError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(uid: &str, id: &EntityId) -> Self {
        Self::NotFound {
            uid: uid.to_string(),
            id: id.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EntityError>;

fn format_ids(ids: &[EntityId]) -> String {
    let parts: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

impl<T> From<std::sync::PoisonError<T>> for EntityError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for EntityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}
