//! Response transformer
//!
//! Turns raw multi-search responses from the cluster into the public
//! response shapes:
//!
//! - [`transform_search`]: content search with facets, suggestions,
//!   featured result and department matches
//! - [`ReleaseTransformer`]: release calendar with the lifecycle breakdown
//!
//! Highlighted fragments of content hits are converted into plain text
//! plus match offsets by [`find_matches`].

pub mod error;
pub mod highlight;
pub mod models;
pub mod release;
pub mod search;

pub use error::TransformError;
pub use highlight::{find_matches, HighlightedText, Match};
pub use models::{
    Breakdown, ContentItem, Departments, FacetCount, LabelledCount, Release, ReleaseResponse,
    SearchResponse,
};
pub use release::{CensusPredicate, ReleaseTransformer, SurveyCensus};
pub use search::{document_from_source, transform_search};
