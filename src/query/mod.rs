//! Query translation
//!
//! Callers describe what they want with a uniform, content-type agnostic
//! [`QueryParams`] object. [`transform_params_to_query`] turns it into the
//! [`Query`] object every store executor understands. Translation is pure:
//! no I/O, no global state.

mod params;
mod sort;
mod transform;

pub use params::{
    convert_limit_query_param, convert_page_query_param, convert_page_size_query_param,
    convert_start_query_param,
};
pub use sort::convert_sort_query_params;
pub use transform::{live_clause, transform_params_to_query};

use crate::core::{Entity, EntityId, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

// ============================================================================
// REQUEST PARAMETERS
// ============================================================================

/// Which publication state a read should see on draft/publish types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PublicationState {
    /// Only rows with a publish timestamp
    Live,
    /// Drafts and published rows alike
    Preview,
    /// Unrecognized value: imposes no restriction
    Other(String),
}

impl From<String> for PublicationState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "live" => Self::Live,
            "preview" => Self::Preview,
            _ => Self::Other(value),
        }
    }
}

impl From<PublicationState> for String {
    fn from(state: PublicationState) -> Self {
        match state {
            PublicationState::Live => "live".into(),
            PublicationState::Preview => "preview".into(),
            PublicationState::Other(value) => value,
        }
    }
}

/// Generic request parameters.
///
/// Numeric values stay raw JSON so that conversion can reject negative and
/// non-numeric input with a precise error instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub populate: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_state: Option<PublicationState>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: impl Into<JsonValue>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<JsonValue>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn page(mut self, page: impl Into<JsonValue>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn page_size(mut self, page_size: impl Into<JsonValue>) -> Self {
        self.page_size = Some(page_size.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<JsonValue>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filters(mut self, filters: JsonValue) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn fields(mut self, fields: impl Into<JsonValue>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    pub fn populate(mut self, populate: impl Into<JsonValue>) -> Self {
        self.populate = Some(populate.into());
        self
    }

    pub fn publication_state(mut self, state: PublicationState) -> Self {
        self.publication_state = Some(state);
        self
    }

    /// Only the selection part (`fields`, `populate`) of these params.
    pub fn selection(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            populate: self.populate.clone(),
            ..Self::default()
        }
    }
}

// ============================================================================
// STORE QUERY OBJECT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ordering key: a (possibly dotted) field path and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Intermediate representation handed opaquely to the store executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub order_by: Vec<OrderBy>,
    #[serde(rename = "where")]
    pub filter: Option<JsonValue>,
    pub select: Option<Vec<String>>,
    pub populate: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `where: { id }`
    pub fn by_id(id: &EntityId) -> Self {
        Self::new().with_id(id)
    }

    /// `where: { id: { $in: ids } }`
    pub fn by_ids<'a>(ids: impl IntoIterator<Item = &'a EntityId>) -> Self {
        let ids: Vec<JsonValue> = ids.into_iter().map(EntityId::to_value).collect();
        Self::new().with_filter(json!({ ID_FIELD: { "$in": ids } }))
    }

    /// Replace the filter with a primary key lookup, keeping selection.
    pub fn with_id(mut self, id: &EntityId) -> Self {
        self.filter = Some(json!({ ID_FIELD: id.to_value() }));
        self
    }

    pub fn with_filter(mut self, filter: JsonValue) -> Self {
        self.filter = Some(filter);
        self
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub results: Vec<Entity>,
    pub pagination: Pagination,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }
}
