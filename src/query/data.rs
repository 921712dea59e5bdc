//! URI/type data lookup and timeseries queries

use super::minify::minify;
use super::{QueryBuilder, QueryError};
use minijinja::context;
use serde::Serialize;

/// Bulk lookup of documents by URI, optionally narrowed by type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataRequest {
    pub uris: Vec<String>,
    pub types: Vec<String>,
}

impl DataRequest {
    /// Every requested URI can match at most one document
    fn size(&self) -> usize {
        self.uris.len().max(1)
    }
}

impl QueryBuilder {
    pub fn build_data_query(&self, request: &DataRequest) -> Result<String, QueryError> {
        let rendered = self.render(
            "data/query.tmpl",
            context! {
                uris => &request.uris,
                types => &request.types,
                size => request.size(),
            },
        )?;
        minify(&rendered)
    }

    /// Latest timeseries document for a CDID
    pub fn build_timeseries_query(&self, cdid: &str) -> Result<String, QueryError> {
        let rendered = self.render("timeseries/query.tmpl", context! { cdid => cdid })?;
        minify(&rendered)
    }
}
