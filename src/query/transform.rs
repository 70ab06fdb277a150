use super::params::{
    convert_limit_query_param, convert_page_query_param, convert_page_size_query_param,
    convert_start_query_param,
};
use super::sort::convert_sort_query_params;
use super::{PublicationState, Query, QueryParams};
use crate::config::EntityServiceConfig;
use crate::core::{EntityError, PUBLISHED_AT_FIELD, Result};
use crate::schema::ContentTypeSchema;
use serde_json::{Value as JsonValue, json};

/// Filter matching published rows only.
pub fn live_clause() -> JsonValue {
    json!({ PUBLISHED_AT_FIELD: { "$notNull": true } })
}

/// Map generic request parameters to a store query for `model`.
///
/// The schema is passed in already resolved; translation itself never
/// touches the registry or the store.
pub fn transform_params_to_query(
    model: &ContentTypeSchema,
    params: &QueryParams,
    config: &EntityServiceConfig,
) -> Result<Query> {
    let mut query = Query::new();

    let uses_offset = params.start.is_some() || params.limit.is_some();
    let uses_pages = params.page.is_some() || params.page_size.is_some();
    if uses_offset && uses_pages {
        return Err(EntityError::InvalidParams(
            "Cannot use both page & pageSize and start & limit".to_string(),
        ));
    }

    if let Some(start) = &params.start {
        query.offset = Some(convert_start_query_param(start)?);
    }

    if let Some(limit) = &params.limit {
        query.limit = convert_limit_query_param(limit, config.max_limit)?;
    }

    if let Some(page) = &params.page {
        query.page = Some(convert_page_query_param(page)?);
    }

    if let Some(page_size) = &params.page_size {
        query.page_size = Some(convert_page_size_query_param(page_size, config.max_limit)?);
    }

    if let Some(sort) = &params.sort {
        query.order_by = convert_sort_query_params(sort)?;
    }

    if let Some(filters) = &params.filters {
        query.filter = Some(filters.clone());
    }

    if let Some(fields) = &params.fields {
        query.select = Some(cast_string_array(fields, "fields")?);
    }

    if let Some(populate) = &params.populate {
        query.populate = convert_populate(populate)?;
    }

    if let Some(state) = &params.publication_state
        && model.has_draft_and_publish()
        && *state == PublicationState::Live
    {
        let existing = query.filter.take().unwrap_or_else(|| json!({}));
        query.filter = Some(json!({ "$and": [live_clause(), existing] }));
    }

    Ok(query)
}

fn cast_string_array(value: &JsonValue, param: &str) -> Result<Vec<String>> {
    match value {
        JsonValue::String(s) => Ok(vec![s.clone()]),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    EntityError::InvalidParams(format!("{} expected strings, got {}", param, item))
                })
            })
            .collect(),
        other => Err(EntityError::InvalidParams(format!(
            "{} expected a string or a list of strings, got {}",
            param, other
        ))),
    }
}

fn convert_populate(populate: &JsonValue) -> Result<Vec<String>> {
    match populate {
        JsonValue::Null | JsonValue::Bool(false) => Ok(Vec::new()),
        JsonValue::Bool(true) => Ok(vec!["*".to_string()]),
        JsonValue::Object(obj) => Ok(obj
            .iter()
            .filter(|(_, value)| !matches!(value, JsonValue::Null | JsonValue::Bool(false)))
            .map(|(key, _)| key.clone())
            .collect()),
        other => cast_string_array(other, "populate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OrderBy;

    fn article() -> ContentTypeSchema {
        ContentTypeSchema::collection("api::article.article", "article").draft_and_publish()
    }

    fn translate(params: QueryParams) -> Result<Query> {
        transform_params_to_query(&article(), &params, &EntityServiceConfig::default())
    }

    #[test]
    fn test_empty_params_default_to_empty_populate() {
        let query = translate(QueryParams::new()).unwrap();
        assert_eq!(query, Query::default());
        assert!(query.populate.is_empty());
    }

    #[test]
    fn test_pagination_passes_through() {
        for (start, limit) in [(0u64, 1u64), (5, 10), (100, 0), (7, 250)] {
            let query = translate(QueryParams::new().start(start).limit(limit)).unwrap();
            assert_eq!(query.offset, Some(start));
            assert_eq!(query.limit, Some(limit));
        }
    }

    #[test]
    fn test_pagination_rejects_bad_values() {
        assert!(translate(QueryParams::new().start(-5)).is_err());
        assert!(translate(QueryParams::new().limit("many")).is_err());
        assert!(translate(QueryParams::new().start(1.25)).is_err());
    }

    #[test]
    fn test_page_and_offset_params_are_exclusive() {
        let err = translate(QueryParams::new().start(1).page(2)).unwrap_err();
        assert!(matches!(err, EntityError::InvalidParams(_)));

        let query = translate(QueryParams::new().page(2).page_size(20)).unwrap();
        assert_eq!(query.page, Some(2));
        assert_eq!(query.page_size, Some(20));
    }

    #[test]
    fn test_selection_is_normalized_to_sequences() {
        let query = translate(QueryParams::new().fields("title").populate("author")).unwrap();
        assert_eq!(query.select, Some(vec!["title".to_string()]));
        assert_eq!(query.populate, vec!["author".to_string()]);

        let query = translate(
            QueryParams::new()
                .fields(json!(["title", "slug"]))
                .populate(json!({"author": true, "tags": false, "seo": {}})),
        )
        .unwrap();
        assert_eq!(query.select, Some(vec!["title".to_string(), "slug".to_string()]));
        assert_eq!(query.populate, vec!["author".to_string(), "seo".to_string()]);
    }

    #[test]
    fn test_sort_becomes_order_by() {
        let query = translate(QueryParams::new().sort("title:desc")).unwrap();
        assert_eq!(query.order_by, vec![OrderBy::desc("title")]);
    }

    #[test]
    fn test_filters_unchanged_without_publication_state() {
        let filters = json!({"title": {"$eq": "hello"}});
        let query = translate(QueryParams::new().filters(filters.clone())).unwrap();
        assert_eq!(query.filter, Some(filters));
    }

    #[test]
    fn test_live_publication_state_is_conjoined_with_filters() {
        let filters = json!({"title": {"$eq": "hello"}});
        let query = translate(
            QueryParams::new()
                .filters(filters.clone())
                .publication_state(PublicationState::Live),
        )
        .unwrap();

        assert_eq!(query.filter, Some(json!({"$and": [live_clause(), filters]})));
    }

    #[test]
    fn test_live_publication_state_without_filters() {
        let query = translate(QueryParams::new().publication_state(PublicationState::Live)).unwrap();
        assert_eq!(query.filter, Some(json!({"$and": [live_clause(), {}]})));
    }

    #[test]
    fn test_preview_and_unknown_states_do_not_restrict() {
        let filters = json!({"slug": "a"});
        for state in [PublicationState::Preview, PublicationState::Other("draft".into())] {
            let query = translate(QueryParams::new().filters(filters.clone()).publication_state(state))
                .unwrap();
            assert_eq!(query.filter, Some(filters.clone()));
        }
    }

    #[test]
    fn test_publication_state_ignored_without_draft_and_publish() {
        let plain = ContentTypeSchema::collection("api::tag.tag", "tag");
        let params = QueryParams::new().publication_state(PublicationState::Live);
        let query = transform_params_to_query(&plain, &params, &EntityServiceConfig::default()).unwrap();
        assert_eq!(query.filter, None);
    }

    #[test]
    fn test_params_deserialize_from_request_json() {
        let params: QueryParams = serde_json::from_value(json!({
            "start": "10",
            "limit": 5,
            "publicationState": "live",
            "filters": {"title": "x"}
        }))
        .unwrap();

        assert_eq!(params.publication_state, Some(PublicationState::Live));
        let query = translate(params).unwrap();
        assert_eq!(query.offset, Some(10));
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_max_limit_clamps() {
        let config = EntityServiceConfig::new().max_limit(20);
        let query =
            transform_params_to_query(&article(), &QueryParams::new().limit(100), &config).unwrap();
        assert_eq!(query.limit, Some(20));
    }
}
