//! Documents flowing through the reindex pipeline and stored in the index

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw document extracted from an upstream catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub uri: String,
    pub body: Vec<u8>,
}

impl Document {
    pub fn new(uri: impl Into<String>, body: Vec<u8>) -> Self {
        let uri = uri.into();
        Self {
            id: document_id(&uri),
            uri,
            body,
        }
    }
}

/// Document id for a URI: the path-escaped URI
pub fn document_id(uri: &str) -> String {
    urlencoding::encode(uri).into_owned()
}

/// A change to a scheduled release date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateChange {
    #[serde(default, alias = "changeNotice")]
    pub change_notice: String,
    #[serde(default, alias = "previousDate")]
    pub previous_date: String,
}

/// Population type of a census-derived dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationType {
    pub name: String,
    #[serde(default)]
    pub label: String,
}

/// A dataset dimension; `label` is `raw_label` without its category count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub raw_label: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, raw_label: impl Into<String>) -> Self {
        let raw_label = raw_label.into();
        Self {
            name: name.into(),
            label: strip_category_count(&raw_label),
            raw_label,
        }
    }
}

static CATEGORY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(\d+ categor(?:y|ies)\)\s*$").expect("static regex"));

/// Remove a trailing "(N categories)" suffix from a dimension label
pub fn strip_category_count(raw_label: &str) -> String {
    CATEGORY_COUNT.replace(raw_label, "").into_owned()
}

/// The document shape stored in the search index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "type", alias = "data_type", default)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cdid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dataset_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub meta_description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_changes: Vec<DateChange>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub finalised: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub latest_release: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub canonical_topic: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provisional_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub survey: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_type: Option<PopulationType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Dimension>,
}

impl IndexedDocument {
    /// A release whose confirmed date has since been moved
    pub fn is_postponed(&self) -> bool {
        self.finalised && !self.date_changes.is_empty()
    }

    pub fn is_census(&self) -> bool {
        self.survey.eq_ignore_ascii_case("census")
    }
}

/// Page metadata as the CMS publishes it, nested under `description`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsDescription {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub edition: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub cdid: String,
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub latest_release: Option<bool>,
    #[serde(default)]
    pub finalised: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub provisional_date: String,
    #[serde(default)]
    pub survey: String,
    #[serde(default)]
    pub canonical_topic: String,
}

/// A CMS page: identity at the top level, metadata under `description`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmsDocument {
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub description: CmsDescription,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub date_changes: Vec<DateChange>,
}

impl From<CmsDocument> for IndexedDocument {
    fn from(doc: CmsDocument) -> Self {
        let d = doc.description;
        let title = if d.edition.is_empty() {
            d.title
        } else {
            format!("{}: {}", d.title, d.edition)
        };

        IndexedDocument {
            data_type: doc.data_type,
            cdid: d.cdid,
            dataset_id: d.dataset_id,
            keywords: d.keywords,
            meta_description: d.meta_description,
            release_date: d.release_date,
            summary: d.summary,
            title,
            topics: doc.topics,
            uri: doc.uri,
            date_changes: doc.date_changes,
            cancelled: d.cancelled,
            finalised: d.finalised,
            published: d.published,
            latest_release: d.latest_release.unwrap_or(false),
            canonical_topic: d.canonical_topic,
            provisional_date: d.provisional_date,
            language: d.language,
            survey: d.survey,
            population_type: None,
            dimensions: Vec::new(),
        }
    }
}
