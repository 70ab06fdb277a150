use super::{AttributeKind, ContentTypeSchema};
use crate::core::{EntityError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Source of content-type schemas.
///
/// Lookups are synchronous and carry no caching semantics; an unknown uid
/// yields `None`.
pub trait SchemaRegistry: Send + Sync {
    fn get_model(&self, uid: &str) -> Option<Arc<ContentTypeSchema>>;
}

/// Registry backed by a map of schemas registered up front.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaRegistry {
    models: HashMap<String, Arc<ContentTypeSchema>>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ContentTypeSchema) -> &mut Self {
        self.models.insert(schema.uid.clone(), Arc::new(schema));
        self
    }

    pub fn with(mut self, schema: ContentTypeSchema) -> Self {
        self.register(schema);
        self
    }

    /// Register every schema of a JSON array document.
    pub fn load_json(&mut self, json: &str) -> Result<&mut Self> {
        let schemas: Vec<ContentTypeSchema> = serde_json::from_str(json)?;
        for schema in schemas {
            self.register(schema);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn uids(&self) -> Vec<&str> {
        let mut uids: Vec<&str> = self.models.keys().map(String::as_str).collect();
        uids.sort_unstable();
        uids
    }

    /// Check that every relation target and component uid named by a
    /// registered schema is itself registered.
    pub fn check_references(&self) -> Result<()> {
        for schema in self.models.values() {
            for (name, attribute) in &schema.attributes {
                let referenced: Vec<&String> = match &attribute.kind {
                    AttributeKind::Relation { target, .. } => vec![target],
                    AttributeKind::Component { component, .. } => vec![component],
                    AttributeKind::DynamicZone { components } => components.iter().collect(),
                    AttributeKind::Media { .. } | AttributeKind::Scalar(_) => Vec::new(),
                };

                if let Some(missing) = referenced.into_iter().find(|uid| !self.models.contains_key(*uid)) {
                    return Err(EntityError::Schema(format!(
                        "Attribute '{}.{}' references unknown model '{}'",
                        schema.uid, name, missing
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SchemaRegistry for InMemorySchemaRegistry {
    fn get_model(&self, uid: &str) -> Option<Arc<ContentTypeSchema>> {
        self.models.get(uid).cloned()
    }
}
