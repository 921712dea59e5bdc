//! Datasets catalogue client and the dataset-to-document mapping

use super::error::UpstreamClientError;
use super::population_types::population_type_label;
use super::upstream::UpstreamHttp;
use crate::config::UpstreamConfig;
use crate::error::Upstream;
use crate::models::{Dimension, IndexedDocument, PopulationType};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Document type of a dataset not based on a flexible table
pub const DATASET_LANDING_PAGE: &str = "dataset_landing_page";

/// One page of the dataset listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetPage {
    #[serde(default)]
    pub items: Vec<DatasetSummary>,
    #[serde(default)]
    pub total_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EditionList {
    #[serde(default)]
    items: Vec<Edition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditionLinks {
    #[serde(default)]
    pub latest_version: Link,
}

/// An edition and a pointer to its latest version
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Edition {
    pub edition: String,
    #[serde(default)]
    pub links: EditionLinks,
}

/// Flexible table a dataset is derived from
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IsBasedOn {
    #[serde(rename = "@type", alias = "type", default)]
    pub based_on_type: String,
    #[serde(rename = "@id", alias = "id", default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VersionDimension {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_area_type: Option<bool>,
}

/// Per-version metadata document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VersionMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub is_based_on: Option<IsBasedOn>,
    #[serde(default)]
    pub dimensions: Vec<VersionDimension>,
}

impl VersionMetadata {
    /// Project onto the indexed document shape; area-type dimensions are dropped
    pub fn into_document(self, dataset_id: &str, edition: &str, version: &str) -> IndexedDocument {
        let (data_type, population_type) = match &self.is_based_on {
            Some(based_on) if !based_on.based_on_type.is_empty() => (
                based_on.based_on_type.clone(),
                Some(PopulationType {
                    name: based_on.id.clone(),
                    label: population_type_label(&based_on.id)
                        .unwrap_or_default()
                        .to_string(),
                }),
            ),
            _ => (DATASET_LANDING_PAGE.to_string(), None),
        };

        let dimensions = self
            .dimensions
            .into_iter()
            .filter(|d| !d.is_area_type.unwrap_or(false))
            .map(|d| Dimension::new(d.name, d.label))
            .collect();

        IndexedDocument {
            data_type,
            uri: format!("/datasets/{dataset_id}/editions/{edition}/versions/{version}"),
            dataset_id: dataset_id.to_string(),
            title: self.title,
            summary: self.description,
            keywords: self.keywords,
            release_date: self.release_date,
            population_type,
            dimensions,
            ..Default::default()
        }
    }
}

/// Source of dataset editions and version metadata
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn datasets(&self, offset: usize, limit: usize) -> Result<DatasetPage, UpstreamClientError>;

    async fn editions(&self, dataset_id: &str) -> Result<Vec<Edition>, UpstreamClientError>;

    async fn version_metadata(
        &self,
        dataset_id: &str,
        edition: &str,
        version: &str,
    ) -> Result<VersionMetadata, UpstreamClientError>;
}

/// HTTP client for the datasets catalogue
#[derive(Clone)]
pub struct DatasetApiClient {
    http: UpstreamHttp,
}

impl DatasetApiClient {
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Result<Self, UpstreamClientError> {
        Ok(Self {
            http: UpstreamHttp::new(Upstream::Datasets, base_url, auth_token, timeout)?,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamClientError> {
        Self::new(
            &config.dataset_api_url,
            &config.service_auth_token,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl DatasetSource for DatasetApiClient {
    async fn datasets(&self, offset: usize, limit: usize) -> Result<DatasetPage, UpstreamClientError> {
        self.http
            .get_json(&format!("/datasets?offset={offset}&limit={limit}"))
            .await
    }

    async fn editions(&self, dataset_id: &str) -> Result<Vec<Edition>, UpstreamClientError> {
        let list: EditionList = self
            .http
            .get_json(&format!("/datasets/{}/editions", urlencoding::encode(dataset_id)))
            .await?;
        Ok(list.items)
    }

    async fn version_metadata(
        &self,
        dataset_id: &str,
        edition: &str,
        version: &str,
    ) -> Result<VersionMetadata, UpstreamClientError> {
        self.http
            .get_json(&format!(
                "/datasets/{}/editions/{}/versions/{}/metadata",
                urlencoding::encode(dataset_id),
                urlencoding::encode(edition),
                urlencoding::encode(version)
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(json: &str) -> VersionMetadata {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_landing_page_mapping() {
        let doc = metadata(
            r#"{"title":"Wellbeing","description":"Personal wellbeing","keywords":["happiness"],"release_date":"2024-01-01"}"#,
        )
        .into_document("wellbeing", "2024", "1");

        assert_eq!(doc.data_type, DATASET_LANDING_PAGE);
        assert_eq!(doc.uri, "/datasets/wellbeing/editions/2024/versions/1");
        assert_eq!(doc.dataset_id, "wellbeing");
        assert_eq!(doc.summary, "Personal wellbeing");
        assert!(doc.population_type.is_none());
    }

    #[test]
    fn test_flexible_table_mapping() {
        let doc = metadata(
            r#"{
                "title": "Age by sex",
                "is_based_on": {"@type": "cantabular_flexible_table", "@id": "UR"},
                "dimensions": [
                    {"name": "ltla", "label": "Lower tier local authorities", "is_area_type": true},
                    {"name": "age", "label": "Age (6 categories)"},
                    {"name": "sex", "label": "Sex (2 categories)", "is_area_type": false}
                ]
            }"#,
        )
        .into_document("TS009", "2021", "2");

        assert_eq!(doc.data_type, "cantabular_flexible_table");
        let population = doc.population_type.unwrap();
        assert_eq!(population.name, "UR");
        assert_eq!(population.label, "All usual residents");

        let names: Vec<&str> = doc.dimensions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["age", "sex"]);
        assert_eq!(doc.dimensions[0].label, "Age");
        assert_eq!(doc.dimensions[0].raw_label, "Age (6 categories)");
    }

    #[tokio::test]
    async fn test_client_walks_catalogue() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/datasets")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("offset".into(), "0".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "10".into()),
            ]))
            .with_body(r#"{"items":[{"id":"TS009"}],"count":1,"total_count":1}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/datasets/TS009/editions")
            .with_body(r#"{"items":[{"edition":"2021","links":{"latest_version":{"id":"2","href":"http://x"}}}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/datasets/TS009/editions/2021/versions/2/metadata")
            .with_body(r#"{"title":"Age by sex"}"#)
            .create_async()
            .await;

        let client = DatasetApiClient::new(&server.url(), "", Duration::from_secs(5)).unwrap();
        let page = client.datasets(0, 10).await.unwrap();
        assert_eq!(page.total_count, 1);

        let editions = client.editions(&page.items[0].id).await.unwrap();
        assert_eq!(editions[0].links.latest_version.id, "2");

        let meta = client.version_metadata("TS009", "2021", "2").await.unwrap();
        assert_eq!(meta.title, "Age by sex");
    }
}
