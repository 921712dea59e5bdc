//! Raw cluster responses and the public response shapes

use super::highlight::HighlightedText;
use crate::models::{DateChange, IndexedDocument};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Raw Elasticsearch shapes
// ============================================================================

/// `{responses: [...]}` envelope of a multi-search
#[derive(Debug, Deserialize)]
pub struct EsMultiResponse {
    pub responses: Vec<EsResponse>,
}

/// One sub-query response
#[derive(Debug, Default, Deserialize)]
pub struct EsResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub hits: EsHits,
    #[serde(default)]
    pub aggregations: HashMap<String, EsAggregation>,
    #[serde(default)]
    pub suggest: BTreeMap<String, Vec<EsSuggestEntry>>,
    /// Set instead of hits when this sub-query failed
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EsHits {
    #[serde(default, deserialize_with = "deserialize_total")]
    pub total: u64,
    #[serde(default)]
    pub hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
pub struct EsHit {
    #[serde(rename = "_source", default)]
    pub source: serde_json::Value,
    #[serde(default)]
    pub highlight: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EsAggregation {
    #[serde(default)]
    pub buckets: Vec<EsBucket>,
}

#[derive(Debug, Deserialize)]
pub struct EsBucket {
    #[serde(deserialize_with = "deserialize_key")]
    pub key: String,
    pub doc_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct EsSuggestEntry {
    #[serde(default)]
    pub options: Vec<EsSuggestOption>,
}

#[derive(Debug, Deserialize)]
pub struct EsSuggestOption {
    pub text: String,
}

/// `hits.total` is a bare number on older clusters and `{value, relation}` on newer ones
fn deserialize_total<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Count(u64),
        Object { value: u64 },
    }

    Ok(match Total::deserialize(deserializer)? {
        Total::Count(n) => n,
        Total::Object { value } => value,
    })
}

/// Bucket keys are strings for keyword fields and numbers for booleans/dates
fn deserialize_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl EsResponse {
    pub fn aggregation(&self, names: &[&str]) -> Option<&EsAggregation> {
        names.iter().find_map(|name| self.aggregations.get(*name))
    }
}

// ============================================================================
// Public content search response
// ============================================================================

/// Facet count for a content type or topic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetCount {
    #[serde(rename = "type")]
    pub facet: String,
    pub count: u64,
}

/// Facet count with a human-readable label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledCount {
    #[serde(rename = "type")]
    pub facet: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    pub count: u64,
}

/// One search hit: the stored document plus its highlighted fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentItem {
    #[serde(flatten)]
    pub document: IndexedDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<HighlightedText>>>,
}

/// A department hit, passed through as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentItem {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<HighlightedText>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departments {
    pub count: u64,
    pub items: Vec<DepartmentItem>,
}

/// Public response of the content search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub took: u64,
    pub count: u64,
    pub content_types: Vec<FacetCount>,
    pub topics: Vec<FacetCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub population_type: Vec<LabelledCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<LabelledCount>,
    pub items: Vec<ContentItem>,
    pub suggestions: Vec<String>,
    pub additional_suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_result: Option<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departments: Option<Departments>,
}

// ============================================================================
// Public release calendar response
// ============================================================================

/// Release counts by lifecycle bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub total: u64,
    pub provisional: u64,
    pub confirmed: u64,
    pub postponed: u64,
    pub published: u64,
    pub cancelled: u64,
    pub census: u64,
}

/// Calendar entry metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseDescription {
    pub title: String,
    pub summary: String,
    pub release_date: String,
    pub published: bool,
    pub cancelled: bool,
    pub finalised: bool,
    pub postponed: bool,
    pub census: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provisional_date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub canonical_topic: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date_changes: Vec<DateChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Release {
    pub uri: String,
    pub description: ReleaseDescription,
    /// Tagged fragments, kept exactly as the cluster returned them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

/// Public response of the release calendar search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseResponse {
    pub took: u64,
    pub limit: usize,
    pub offset: usize,
    pub breakdown: Breakdown,
    pub releases: Vec<Release>,
}
