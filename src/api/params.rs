//! Query-string parsing into validated search requests

use crate::error::AppError;
use crate::query::{DataRequest, ReleaseSearchRequest, SearchFilters, SearchRequest, SubQuery};
use crate::validation::{ValidationError, ValidationReason, ValidatorSet};
use std::str::FromStr;

/// Query-string pairs in arrival order; names may repeat
#[derive(Debug, Clone, Default)]
pub struct Params(Vec<(String, String)>);

impl From<Vec<(String, String)>> for Params {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl Params {
    /// First value of a parameter
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a parameter, with comma-separated values split out
    pub fn all(&self, name: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(key, _)| key == name)
            .flat_map(|(_, value)| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Every value of a parameter, exactly as sent
    pub fn repeated(&self, name: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// `raw=true` asks for the cluster response untouched
    pub fn raw(&self) -> bool {
        self.get("raw")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    /// Run the set's validator for `name` when the parameter is present
    fn validated<T>(
        &self,
        name: &str,
        validate: impl FnOnce(&str) -> Result<T, ValidationError>,
    ) -> Result<Option<T>, ValidationError> {
        self.get(name).map(validate).transpose()
    }
}

fn sub_queries(params: &Params) -> Result<Option<Vec<SubQuery>>, ValidationError> {
    let names = params.all("queries");
    if names.is_empty() {
        return Ok(None);
    }
    names
        .iter()
        .map(|name| {
            SubQuery::from_str(name)
                .map_err(|_| ValidationError::new("queries", ValidationReason::Unknown))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Build a content search from the query string
pub fn search_request(set: &ValidatorSet, params: &Params) -> Result<SearchRequest, AppError> {
    let mut request = SearchRequest {
        term: params.get("q").unwrap_or_default().trim().to_string(),
        ..Default::default()
    };

    if let Some(size) = params.validated("limit", |v| set.size("limit", v))? {
        request.size = size;
    }
    if let Some(from) = params.validated("offset", |v| set.size("offset", v))? {
        request.from = from;
    }
    if let Some(sort) = params.validated("sort", |v| set.sort("sort", v))? {
        request.sort = sort;
    }
    if let Some(highlight) = params.validated("highlight", |v| set.flag("highlight", v))? {
        request.highlight = highlight;
    }
    if let Some(suggest) = params.validated("suggest", |v| set.suggestion("suggest", v))? {
        request.suggest = suggest;
    }
    if let Some(field) = params.validated("agg", |v| set.field("agg", v))? {
        request.agg_field = field;
    }
    if let Some(queries) = sub_queries(params)? {
        request.queries = queries;
    }

    let types = params.all("content_type");
    if !types.is_empty() {
        request.types = types;
    }

    let mut filters = SearchFilters {
        first_letter: params.get("first_letter").unwrap_or_default().to_string(),
        uri_prefix: params.get("uri_prefix").unwrap_or_default().to_string(),
        topics: params.all("topics"),
        topic_wildcards: params.all("topic_wildcards"),
        ..Default::default()
    };
    if let Some(latest) = params.validated("latest", |v| set.flag("latest", v))? {
        filters.latest = latest;
    }
    if let Some(upcoming) = params.validated("upcoming", |v| set.flag("upcoming", v))? {
        filters.upcoming = upcoming;
    }
    if let Some(published) = params.validated("published", |v| set.flag("published", v))? {
        filters.published = published;
    }
    if let Some(after) = params.validated("fromDate", |v| set.date("fromDate", v))? {
        filters.released_after = after;
    }
    if let Some(before) = params.validated("toDate", |v| set.date("toDate", v))? {
        filters.released_before = before;
    }
    if !filters.released_after.is_zero()
        && !filters.released_before.is_zero()
        && filters.released_after > filters.released_before
    {
        return Err(AppError::InvalidDateRange);
    }
    request.filters = filters;

    Ok(request)
}

/// Build a release calendar search from the query string
pub fn release_request(
    set: &ValidatorSet,
    params: &Params,
) -> Result<ReleaseSearchRequest, AppError> {
    let mut request = ReleaseSearchRequest {
        term: params.get("query").unwrap_or_default().trim().to_string(),
        ..Default::default()
    };

    if let Some(size) = params.validated("limit", |v| set.size("limit", v))? {
        request.size = size;
    }
    if let Some(from) = params.validated("offset", |v| set.size("offset", v))? {
        request.from = from;
    }
    if let Some(sort) = params.validated("sort", |v| set.release_sort("sort", v))? {
        request.sort = sort;
    }
    if let Some(after) = params.validated("fromDate", |v| set.date("fromDate", v))? {
        request.released_after = after;
    }
    if let Some(before) = params.validated("toDate", |v| set.date("toDate", v))? {
        request.released_before = before;
    }
    if let Some(release_type) =
        params.validated("release-type", |v| set.release_type("release-type", v))?
    {
        request.release_type = release_type;
    }
    for (name, slot) in [
        ("subtype-provisional", &mut request.provisional),
        ("subtype-confirmed", &mut request.confirmed),
        ("subtype-postponed", &mut request.postponed),
        ("census", &mut request.census),
        ("highlight", &mut request.highlight),
    ] {
        if let Some(flag) = params.validated(name, |v| set.flag(name, v))? {
            *slot = flag;
        }
    }

    if !request.dates_ordered() {
        return Err(AppError::InvalidDateRange);
    }
    Ok(request)
}

/// Build a data lookup; `uris` and `types` repeat rather than split
pub fn data_request(params: &Params) -> DataRequest {
    DataRequest {
        uris: params.repeated("uris"),
        types: params.repeated("types"),
    }
}
