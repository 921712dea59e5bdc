//! Release calendar query compilation

use super::minify::minify;
use super::{now_rfc3339, QueryBuilder, QueryError, ONS_INDEX};
use crate::models::{Date, ReleaseSort, ReleaseType};
use serde::Serialize;
use serde_json::json;
use strum::{Display, EnumIter, IntoEnumIterator};

/// A validated release calendar search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseSearchRequest {
    pub term: String,
    pub from: usize,
    pub size: usize,
    pub sort: ReleaseSort,
    pub released_after: Date,
    pub released_before: Date,
    pub release_type: ReleaseType,
    /// Drop the release-type filter; set only on the census count
    pub any_release_type: bool,
    pub provisional: bool,
    pub confirmed: bool,
    pub postponed: bool,
    pub census: bool,
    pub highlight: bool,
    pub now: String,
}

impl Default for ReleaseSearchRequest {
    fn default() -> Self {
        Self {
            term: String::new(),
            from: 0,
            size: 10,
            sort: ReleaseSort::default(),
            released_after: Date::zero(),
            released_before: Date::zero(),
            release_type: ReleaseType::default(),
            any_release_type: false,
            provisional: false,
            confirmed: false,
            postponed: false,
            census: false,
            highlight: true,
            now: now_rfc3339(),
        }
    }
}

impl ReleaseSearchRequest {
    /// `released_after <= released_before` whenever both are set
    pub fn dates_ordered(&self) -> bool {
        self.released_after.is_zero()
            || self.released_before.is_zero()
            || self.released_after <= self.released_before
    }

    /// The size-0 variant of this request that counts one breakdown category
    fn count_request(&self, category: BreakdownCategory) -> Self {
        let mut counted = Self {
            from: 0,
            size: 0,
            highlight: false,
            provisional: false,
            confirmed: false,
            postponed: false,
            census: false,
            ..self.clone()
        };

        match category {
            BreakdownCategory::Provisional => {
                counted.release_type = ReleaseType::Upcoming;
                counted.provisional = true;
            }
            BreakdownCategory::Confirmed => {
                counted.release_type = ReleaseType::Upcoming;
                counted.confirmed = true;
            }
            BreakdownCategory::Postponed => {
                counted.release_type = ReleaseType::Upcoming;
                counted.postponed = true;
            }
            BreakdownCategory::Published => counted.release_type = ReleaseType::Published,
            BreakdownCategory::Cancelled => counted.release_type = ReleaseType::Cancelled,
            // census releases are counted whatever their type
            BreakdownCategory::Census => {
                counted.any_release_type = true;
                counted.census = true;
            }
        }
        counted
    }
}

/// One multi-search entry: a header line and a body line, both minified JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPair {
    pub header: String,
    pub body: String,
}

/// Release breakdown counter, each backed by its own count sub-query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum BreakdownCategory {
    Provisional,
    Confirmed,
    Postponed,
    Published,
    Cancelled,
    Census,
}

/// The main release query followed by one count query per category
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseQueries {
    pub pairs: Vec<SearchPair>,
    pub counts: Vec<BreakdownCategory>,
}

impl QueryBuilder {
    /// Render a single release calendar query
    pub fn build_release_query(
        &self,
        request: &ReleaseSearchRequest,
    ) -> Result<SearchPair, QueryError> {
        let rendered = self.render("releases/query.tmpl", request)?;
        let header = json!({"index": ONS_INDEX, "search_type": "dfs_query_then_fetch"});

        Ok(SearchPair {
            header: header.to_string(),
            body: minify(&rendered)?,
        })
    }

    /// Render the main release query plus the breakdown count queries
    pub fn build_release_queries(
        &self,
        request: &ReleaseSearchRequest,
    ) -> Result<ReleaseQueries, QueryError> {
        let mut pairs = vec![self.build_release_query(request)?];
        let counts: Vec<BreakdownCategory> = BreakdownCategory::iter().collect();

        for category in &counts {
            pairs.push(self.build_release_query(&request.count_request(*category))?);
        }

        Ok(ReleaseQueries { pairs, counts })
    }
}
