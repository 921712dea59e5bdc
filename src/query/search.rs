//! Content search multi-search compilation

use super::minify::frame_lines;
use super::{
    check_framing, now_rfc3339, QueryBuilder, QueryError, SubQuery, CONTENT_TYPES,
    DEPARTMENTS_INDEX, FEATURED_TYPES, ONS_INDEX,
};
use crate::models::{Date, Sort, Suggestion};
use minijinja::{context, Value};
use serde::Serialize;
use strum::IntoEnumIterator;

/// Optional narrowing of the content search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilters {
    /// Only the latest release of a series
    pub latest: bool,

    /// Title prefix
    pub first_letter: String,

    pub released_after: Date,
    pub released_before: Date,

    /// URI prefix
    pub uri_prefix: String,

    /// Exact topic ids
    pub topics: Vec<String>,

    /// Topic wildcard patterns, e.g. `*/economy/*`
    pub topic_wildcards: Vec<String>,

    /// Unpublished releases scheduled from now on
    pub upcoming: bool,

    pub published: bool,
}

/// A validated content search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub term: String,
    pub from: usize,
    pub size: usize,
    pub types: Vec<String>,
    pub queries: Vec<SubQuery>,
    pub sort: Sort,
    /// Extra facet, one of the aggregation allow-list or empty
    pub agg_field: String,
    pub highlight: bool,
    pub suggest: Suggestion,
    pub filters: SearchFilters,
    /// UTC RFC3339 time of request receipt
    pub now: String,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            term: String::new(),
            from: 0,
            size: 10,
            types: CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
            queries: vec![SubQuery::Content],
            sort: Sort::default(),
            agg_field: String::new(),
            highlight: true,
            suggest: Suggestion::default(),
            filters: SearchFilters::default(),
            now: now_rfc3339(),
        }
    }
}

impl SearchRequest {
    pub fn has_query(&self, query: SubQuery) -> bool {
        self.queries.contains(&query)
    }

    /// Requested sub-queries in the order the multi-search emits them
    pub fn ordered_queries(&self) -> Vec<SubQuery> {
        SubQuery::iter().filter(|q| self.has_query(*q)).collect()
    }
}

/// A line-framed multi-search body and the names of its sub-queries
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub body: String,
    pub sub_queries: Vec<SubQuery>,
}

impl CompiledSearch {
    /// Position of a sub-query's response in the multi-search reply
    pub fn position(&self, query: SubQuery) -> Option<usize> {
        self.sub_queries.iter().position(|q| *q == query)
    }
}

impl QueryBuilder {
    /// Render the content multi-search for a request
    pub fn build_search_query(&self, request: &SearchRequest) -> Result<CompiledSearch, QueryError> {
        let ctx = context! {
            index => ONS_INDEX,
            departments_index => DEPARTMENTS_INDEX,
            all_types => CONTENT_TYPES,
            featured_types => FEATURED_TYPES,
            ..Value::from_serialize(request)
        };

        let rendered = self.render("search/search.tmpl", ctx)?;
        let body = frame_lines(&rendered)?;
        let sub_queries = request.ordered_queries();
        check_framing(&body, sub_queries.len())?;

        tracing::debug!(
            sub_queries = sub_queries.len(),
            bytes = body.len(),
            "Compiled search query"
        );
        Ok(CompiledSearch { body, sub_queries })
    }
}
