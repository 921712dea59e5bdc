//! Query compiler
//!
//! Turns typed search requests into Elasticsearch request bodies by
//! rendering an embedded template bundle:
//!
//! ```text
//! SearchRequest ──▶ search/search.tmpl ──▶ split on "$$" ──▶ compact JSON lines ──▶ multi-search body
//! ReleaseSearchRequest ──▶ releases/query.tmpl ──▶ SearchPair {header, body}
//! DataRequest / cdid ──▶ data/query.tmpl, timeseries/query.tmpl ──▶ single body
//! ```
//!
//! The templates are the wire contract with the cluster and ship inside the
//! binary. A [`QueryBuilder`] is built once at startup and shared read-only
//! between request handlers.

pub mod data;
pub mod minify;
pub mod release;
pub mod search;

pub use data::DataRequest;
pub use release::{BreakdownCategory, ReleaseQueries, ReleaseSearchRequest, SearchPair};
pub use search::{CompiledSearch, SearchFilters, SearchRequest};

use chrono::{SecondsFormat, Utc};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Alias every search surface reads through
pub const ONS_INDEX: &str = "ons";

/// Index holding government department records
pub const DEPARTMENTS_INDEX: &str = "departments";

/// Content types searched when the request names none
pub const CONTENT_TYPES: &[&str] = &[
    "article",
    "article_download",
    "bulletin",
    "cantabular_flexible_table",
    "cantabular_multivariate_table",
    "compendium_chapter",
    "compendium_data",
    "compendium_landing_page",
    "dataset",
    "dataset_landing_page",
    "product_page",
    "reference_tables",
    "release",
    "static_adhoc",
    "static_article",
    "static_foi",
    "static_landing_page",
    "static_methodology",
    "static_methodology_download",
    "static_page",
    "static_qmi",
    "timeseries",
    "timeseries_dataset",
];

/// Content types eligible to be the featured result
pub const FEATURED_TYPES: &[&str] = &["product_page", "home_page_census"];

/// Errors raised while compiling a query
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("rendered query line {line} is not JSON: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("rendered {rendered} lines for {expected} sub-queries")]
    Framing { expected: usize, rendered: usize },
}

/// Named slice of a content multi-search
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SubQuery {
    Content,
    Counts,
    Featured,
    Departments,
}

/// Server time as embedded into time-sensitive templates
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

macro_rules! template {
    ($name:literal) => {
        ($name, include_str!(concat!("../../templates/", $name)))
    };
}

const TEMPLATES: &[(&str, &str)] = &[
    template!("search/search.tmpl"),
    template!("search/content_query.tmpl"),
    template!("search/core_query.tmpl"),
    template!("search/filters.tmpl"),
    template!("search/aggregations.tmpl"),
    template!("search/counts_query.tmpl"),
    template!("search/featured_query.tmpl"),
    template!("search/departments_query.tmpl"),
    template!("search/highlight.tmpl"),
    template!("search/suggest/phrase.tmpl"),
    template!("search/suggest/term.tmpl"),
    template!("search/sort/relevance.tmpl"),
    template!("search/sort/title.tmpl"),
    template!("search/sort/release_date_asc.tmpl"),
    template!("search/sort/release_date_desc.tmpl"),
    template!("search/sort/first_letter.tmpl"),
    template!("releases/query.tmpl"),
    template!("releases/release_type/upcoming.tmpl"),
    template!("releases/release_type/published.tmpl"),
    template!("releases/release_type/cancelled.tmpl"),
    template!("releases/sort/release_date_asc.tmpl"),
    template!("releases/sort/release_date_desc.tmpl"),
    template!("releases/sort/title_asc.tmpl"),
    template!("releases/sort/title_desc.tmpl"),
    template!("data/query.tmpl"),
    template!("timeseries/query.tmpl"),
];

/// Compiles requests against the embedded template bundle
#[derive(Debug)]
pub struct QueryBuilder {
    env: Environment<'static>,
}

impl QueryBuilder {
    /// Load the template bundle; any template that fails to parse is an error
    pub fn new() -> Result<Self, QueryError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }

        tracing::debug!(templates = TEMPLATES.len(), "Loaded query templates");
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, QueryError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

/// Check a line-framed body holds one header/body pair per sub-query
pub(crate) fn check_framing(wire: &str, expected: usize) -> Result<(), QueryError> {
    let rendered = wire.lines().filter(|l| !l.is_empty()).count();
    if rendered != expected * 2 {
        return Err(QueryError::Framing { expected, rendered });
    }
    Ok(())
}
