pub mod handlers;
pub mod middleware;
pub mod params;
pub mod routes;

pub use routes::*;

use crate::elasticsearch::ElasticSearch;
use crate::query::{QueryBuilder, QueryError};
use crate::transformer::{CensusPredicate, ReleaseTransformer};
use crate::validation::ValidatorSet;
use std::sync::Arc;

/// Shared application state; read-only once built
#[derive(Clone)]
pub struct AppState {
    pub es: Arc<dyn ElasticSearch>,
    pub queries: Arc<QueryBuilder>,
    pub releases: ReleaseTransformer,
    pub search_validators: Arc<ValidatorSet>,
    pub release_validators: Arc<ValidatorSet>,
    /// Bearer token guarding the admin routes; empty disables them
    pub admin_token: Arc<str>,
}

impl AppState {
    /// Build the state, compiling the query templates
    pub fn new(es: Arc<dyn ElasticSearch>) -> Result<Self, QueryError> {
        Ok(Self {
            es,
            queries: Arc::new(QueryBuilder::new()?),
            releases: ReleaseTransformer::default(),
            search_validators: Arc::new(ValidatorSet::search()),
            release_validators: Arc::new(ValidatorSet::release()),
            admin_token: Arc::from(""),
        })
    }

    pub fn with_admin_token(mut self, token: impl AsRef<str>) -> Self {
        self.admin_token = Arc::from(token.as_ref());
        self
    }

    /// Replace how release entries are marked as census
    pub fn with_census_predicate(mut self, census: Arc<dyn CensusPredicate>) -> Self {
        self.releases = ReleaseTransformer::new(census);
        self
    }
}
