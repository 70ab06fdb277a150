//! In-memory store executor
//!
//! Keeps one table of JSON rows per content type, assigns integer ids and
//! understands the full [`Query`] object: filters, ordering, offset/limit
//! and page windows, field selection and population of relations,
//! components and dynamic zones. Relation payloads are normalized on write
//! (`connect` / `set` / `disconnect` envelopes become plain id lists).
//!
//! Every call is recorded, so callers can assert how many round trips an
//! operation performed.

use super::EntityStore;
use super::filter::{compare_values, matches_filter, resolve_path};
use crate::core::{COMPONENT_TYPE_FIELD, Entity, EntityError, EntityId, ID_FIELD, Result};
use crate::query::{OrderBy, Page, Pagination, Query, SortDirection};
use crate::schema::{AttributeKind, ContentTypeSchema, SchemaRegistry};
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

const DEFAULT_PAGE_SIZE: u64 = 10;
const POPULATE_ALL: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    FindOne,
    FindMany,
    FindPage,
    FindWithCount,
    FindWithRelationCounts,
    Count,
    Create,
    Update,
    Delete,
    DeleteMany,
    Load,
}

impl StoreOperation {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Delete | Self::DeleteMany
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub uid: String,
    pub operation: StoreOperation,
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<i64, Entity>,
    next_id: i64,
}

type Tables = HashMap<String, MemoryTable>;

pub struct InMemoryStore {
    registry: Arc<dyn SchemaRegistry>,
    tables: RwLock<Tables>,
    calls: Mutex<Vec<StoreCall>>,
}

impl InMemoryStore {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            tables: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, operation: StoreOperation) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == operation)
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.operation.is_mutation())
            .count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Raw stored rows of a content type, ordered by id.
    pub async fn rows(&self, uid: &str) -> Vec<Entity> {
        let tables = self.tables.read().await;
        tables
            .get(uid)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, uid: &str, operation: StoreOperation) -> Result<()> {
        self.calls.lock()?.push(StoreCall {
            uid: uid.to_string(),
            operation,
        });
        Ok(())
    }

    fn schema(&self, uid: &str) -> Option<Arc<ContentTypeSchema>> {
        self.registry.get_model(uid)
    }

    /// Filtered rows in query order, window applied.
    fn select(&self, tables: &Tables, uid: &str, query: &Query) -> Result<(Vec<Entity>, u64)> {
        let (offset, limit) = window(query)?;
        let Some(table) = tables.get(uid) else {
            return Ok((Vec::new(), 0));
        };

        let matched = matching_rows(table, query)?;
        let total = matched.len() as u64;

        let rows = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit.map_or(usize::MAX, |l| l as usize))
            .map(|(_, row)| self.present(tables, uid, row, query))
            .collect();

        Ok((rows, total))
    }

    /// Apply selection and population to a stored row.
    fn present(&self, tables: &Tables, uid: &str, row: &Entity, query: &Query) -> Entity {
        let mut out: Entity = match &query.select {
            Some(fields) => row
                .iter()
                .filter(|(key, _)| key.as_str() == ID_FIELD || fields.contains(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            None => row.clone(),
        };

        if query.populate.is_empty() {
            return out;
        }
        let Some(schema) = self.schema(uid) else {
            return out;
        };

        for (name, attribute) in &schema.attributes {
            let wanted = query
                .populate
                .iter()
                .any(|p| p == POPULATE_ALL || p == name);
            if !wanted {
                continue;
            }
            if let Some(value) = row.get(name)
                && let Some(populated) = populate_value(tables, &attribute.kind, value)
            {
                out.insert(name.clone(), populated);
            }
        }

        out
    }
}

fn window(query: &Query) -> Result<(u64, Option<u64>)> {
    if let Some(page) = query.page {
        let size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        return Ok((page_offset(page, size)?, Some(size)));
    }
    Ok((query.offset.unwrap_or(0), query.limit.or(query.page_size)))
}

/// Offset of the first row of a 1-based page.
fn page_offset(page: u64, page_size: u64) -> Result<u64> {
    page.saturating_sub(1).checked_mul(page_size).ok_or_else(|| {
        EntityError::InvalidParams(format!("Page {page} with pageSize {page_size} is out of range"))
    })
}

fn matching_rows<'t>(table: &'t MemoryTable, query: &Query) -> Result<Vec<(i64, &'t Entity)>> {
    let mut matched = Vec::new();
    for (id, row) in &table.rows {
        if matches_filter(row, query.filter.as_ref())? {
            matched.push((*id, row));
        }
    }
    if !query.order_by.is_empty() {
        matched.sort_by(|(_, a), (_, b)| compare_rows(a, b, &query.order_by));
    }
    Ok(matched)
}

fn first_match(table: &MemoryTable, query: &Query) -> Result<Option<i64>> {
    Ok(matching_rows(table, query)?.first().map(|(id, _)| *id))
}

/// Multi-key comparison; NULLs last ascending, first descending.
fn compare_rows(a: &Entity, b: &Entity, order_by: &[OrderBy]) -> Ordering {
    for key in order_by {
        let left = resolve_path(a, &key.field).filter(|v| !v.is_null());
        let right = resolve_path(b, &key.field).filter(|v| !v.is_null());

        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
        };

        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn row_key(id: &EntityId) -> Option<i64> {
    match id {
        EntityId::Int(i) => Some(*i),
        EntityId::Str(_) => None,
    }
}

fn fetch_row(tables: &Tables, uid: &str, reference: &JsonValue) -> Option<Entity> {
    let key = EntityId::from_reference(reference).as_ref().and_then(row_key)?;
    tables.get(uid)?.rows.get(&key).cloned()
}

fn populate_value(tables: &Tables, kind: &AttributeKind, value: &JsonValue) -> Option<JsonValue> {
    match kind {
        AttributeKind::Relation { target, .. } => Some(fetch_references(tables, target, value)),
        AttributeKind::Component { component, .. } => Some(fetch_references(tables, component, value)),
        AttributeKind::DynamicZone { .. } => Some(fetch_dynamic_zone(tables, value)),
        AttributeKind::Media { .. } | AttributeKind::Scalar(_) => None,
    }
}

fn fetch_references(tables: &Tables, uid: &str, value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Null => JsonValue::Null,
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .filter_map(|item| fetch_row(tables, uid, item))
                .map(JsonValue::Object)
                .collect(),
        ),
        reference => fetch_row(tables, uid, reference)
            .map(JsonValue::Object)
            .unwrap_or(JsonValue::Null),
    }
}

fn fetch_dynamic_zone(tables: &Tables, value: &JsonValue) -> JsonValue {
    let Some(items) = value.as_array() else {
        return JsonValue::Array(Vec::new());
    };

    let members = items
        .iter()
        .filter_map(|item| {
            let component = item.get(COMPONENT_TYPE_FIELD)?.as_str()?;
            let mut row = fetch_row(tables, component, item)?;
            row.insert(COMPONENT_TYPE_FIELD.to_string(), json!(component));
            Some(JsonValue::Object(row))
        })
        .collect();

    JsonValue::Array(members)
}

fn reference_ids(value: Option<&JsonValue>) -> Vec<EntityId> {
    match value {
        Some(JsonValue::Array(items)) => items.iter().filter_map(EntityId::from_reference).collect(),
        Some(other) => EntityId::from_reference(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Resolve a relation payload against the currently stored value.
fn apply_relation(existing: Option<&JsonValue>, incoming: JsonValue, to_many: bool) -> JsonValue {
    let is_envelope = incoming.as_object().is_some_and(|obj| {
        ["connect", "set", "disconnect"]
            .iter()
            .any(|key| obj.contains_key(*key))
    });

    let ids = if is_envelope {
        let mut ids = match incoming.get("set") {
            Some(set) => reference_ids(Some(set)),
            None => reference_ids(existing),
        };
        for id in reference_ids(incoming.get("connect")) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        let removed = reference_ids(incoming.get("disconnect"));
        ids.retain(|id| !removed.contains(id));
        ids
    } else if incoming.is_null() {
        return JsonValue::Null;
    } else {
        reference_ids(Some(&incoming))
    };

    if to_many || incoming.is_array() {
        JsonValue::Array(ids.iter().map(EntityId::to_value).collect())
    } else {
        ids.last().map(EntityId::to_value).unwrap_or(JsonValue::Null)
    }
}

fn normalize_write(
    schema: Option<&ContentTypeSchema>,
    key: &str,
    existing: Option<&JsonValue>,
    value: JsonValue,
) -> JsonValue {
    match schema.and_then(|s| s.get_attribute(key)).map(|a| &a.kind) {
        Some(AttributeKind::Relation { relation, .. }) => {
            apply_relation(existing, value, relation.is_to_many())
        }
        _ => value,
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn find_one(&self, uid: &str, query: &Query) -> Result<Option<Entity>> {
        self.record(uid, StoreOperation::FindOne)?;
        let tables = self.tables.read().await;
        let Some(table) = tables.get(uid) else {
            return Ok(None);
        };
        Ok(matching_rows(table, query)?
            .first()
            .map(|(_, row)| self.present(&tables, uid, row, query)))
    }

    async fn find_many(&self, uid: &str, query: &Query) -> Result<Vec<Entity>> {
        self.record(uid, StoreOperation::FindMany)?;
        let tables = self.tables.read().await;
        Ok(self.select(&tables, uid, query)?.0)
    }

    async fn find_page(&self, uid: &str, query: &Query) -> Result<Page> {
        self.record(uid, StoreOperation::FindPage)?;

        let (page, page_size) = match query.page {
            Some(page) => (page, query.page_size.unwrap_or(DEFAULT_PAGE_SIZE)),
            None => {
                let size = query.limit.or(query.page_size).unwrap_or(DEFAULT_PAGE_SIZE);
                let offset = query.offset.unwrap_or(0);
                (if size == 0 { 1 } else { offset / size + 1 }, size)
            }
        };

        let windowed = Query {
            offset: Some(match query.offset {
                Some(offset) => offset,
                None => page_offset(page, page_size)?,
            }),
            limit: Some(page_size),
            page: None,
            page_size: None,
            ..query.clone()
        };

        let tables = self.tables.read().await;
        let (results, total) = self.select(&tables, uid, &windowed)?;
        let page_count = if page_size == 0 { 0 } else { total.div_ceil(page_size) };

        Ok(Page {
            results,
            pagination: Pagination {
                page,
                page_size,
                page_count,
                total,
            },
        })
    }

    async fn find_with_count(&self, uid: &str, query: &Query) -> Result<(Vec<Entity>, u64)> {
        self.record(uid, StoreOperation::FindWithCount)?;
        let tables = self.tables.read().await;
        self.select(&tables, uid, query)
    }

    async fn find_with_relation_counts(&self, uid: &str, query: &Query) -> Result<Vec<Entity>> {
        self.record(uid, StoreOperation::FindWithRelationCounts)?;
        let tables = self.tables.read().await;
        let (mut rows, _) = self.select(&tables, uid, query)?;

        if let Some(schema) = self.schema(uid) {
            for row in &mut rows {
                for (name, attribute) in &schema.attributes {
                    if let AttributeKind::Relation { relation, .. } = &attribute.kind
                        && relation.is_to_many()
                        && let Some(JsonValue::Array(items)) = row.get(name)
                    {
                        let count = items.len();
                        row.insert(name.clone(), json!({ "count": count }));
                    }
                }
            }
        }

        Ok(rows)
    }

    async fn count(&self, uid: &str, query: &Query) -> Result<u64> {
        self.record(uid, StoreOperation::Count)?;
        let tables = self.tables.read().await;
        match tables.get(uid) {
            Some(table) => Ok(matching_rows(table, query)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn create(&self, uid: &str, query: &Query, data: Entity) -> Result<Entity> {
        self.record(uid, StoreOperation::Create)?;
        let schema = self.schema(uid);
        let mut tables = self.tables.write().await;

        let table = tables.entry(uid.to_string()).or_default();
        table.next_id += 1;
        let id = table.next_id;

        let mut row = Entity::new();
        row.insert(ID_FIELD.to_string(), json!(id));
        for (key, value) in data {
            if key == ID_FIELD {
                continue;
            }
            let value = normalize_write(schema.as_deref(), &key, None, value);
            row.insert(key, value);
        }
        table.rows.insert(id, row.clone());

        Ok(self.present(&tables, uid, &row, query))
    }

    async fn update(&self, uid: &str, query: &Query, data: Entity) -> Result<Option<Entity>> {
        self.record(uid, StoreOperation::Update)?;
        let schema = self.schema(uid);
        let mut tables = self.tables.write().await;

        let Some(table) = tables.get_mut(uid) else {
            return Ok(None);
        };
        let Some(id) = first_match(table, query)? else {
            return Ok(None);
        };
        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };

        for (key, value) in data {
            if key == ID_FIELD {
                continue;
            }
            let value = normalize_write(schema.as_deref(), &key, row.get(&key), value);
            row.insert(key, value);
        }
        let row = row.clone();

        Ok(Some(self.present(&tables, uid, &row, query)))
    }

    async fn delete(&self, uid: &str, query: &Query) -> Result<Option<Entity>> {
        self.record(uid, StoreOperation::Delete)?;
        let mut tables = self.tables.write().await;

        let found = match tables.get(uid) {
            Some(table) => first_match(table, query)?
                .and_then(|id| table.rows.get(&id).map(|row| (id, row.clone()))),
            None => None,
        };
        let Some((id, row)) = found else {
            return Ok(None);
        };

        let presented = self.present(&tables, uid, &row, query);
        if let Some(table) = tables.get_mut(uid) {
            table.rows.remove(&id);
        }
        Ok(Some(presented))
    }

    async fn delete_many(&self, uid: &str, query: &Query) -> Result<u64> {
        self.record(uid, StoreOperation::DeleteMany)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(uid) else {
            return Ok(0);
        };

        let ids: Vec<i64> = matching_rows(table, query)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        for id in &ids {
            table.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn load(&self, uid: &str, id: &EntityId, attribute: &str) -> Result<JsonValue> {
        self.record(uid, StoreOperation::Load)?;
        let tables = self.tables.read().await;

        let row = tables
            .get(uid)
            .zip(row_key(id))
            .and_then(|(table, key)| table.rows.get(&key))
            .ok_or_else(|| EntityError::not_found(uid, id))?;

        let Some(value) = row.get(attribute) else {
            return Ok(JsonValue::Null);
        };

        let schema = self
            .schema(uid)
            .ok_or_else(|| EntityError::ModelNotFound(uid.to_string()))?;
        let definition = schema.get_attribute(attribute).ok_or_else(|| {
            EntityError::Schema(format!("Unknown attribute '{}' on '{}'", attribute, uid))
        })?;

        Ok(populate_value(&tables, &definition.kind, value).unwrap_or_else(|| value.clone()))
    }
}
