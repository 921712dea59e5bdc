//! Content search response shaping

use super::error::TransformError;
use super::highlight::{find_matches, HighlightedText};
use super::models::*;
use crate::models::{CmsDocument, IndexedDocument};
use crate::query::SubQuery;
use std::collections::{BTreeMap, HashMap};

/// Aggregation names the content type facet may be published under
const CONTENT_TYPE_AGGS: &[&str] = &["content_types", "docCounts"];
const TOPIC_AGGS: &[&str] = &["topic", "topics"];
const SEARCH_SUGGESTER: &str = "search_suggest";

/// Read a hit's `_source`, accepting both the CMS shape and the indexed shape
pub fn document_from_source(source: serde_json::Value) -> Result<IndexedDocument, serde_json::Error> {
    if source.get("description").is_some_and(|d| d.is_object()) {
        let cms: CmsDocument = serde_json::from_value(source)?;
        Ok(cms.into())
    } else {
        serde_json::from_value(source)
    }
}

fn convert_highlight(
    highlight: BTreeMap<String, Vec<String>>,
) -> Option<BTreeMap<String, Vec<HighlightedText>>> {
    if highlight.is_empty() {
        return None;
    }
    Some(
        highlight
            .into_iter()
            .map(|(field, fragments)| {
                let converted = fragments.iter().map(|f| find_matches(f)).collect();
                (field, converted)
            })
            .collect(),
    )
}

fn content_item(
    position: usize,
    hit: EsHit,
    highlight: bool,
) -> Result<ContentItem, TransformError> {
    let document = document_from_source(hit.source)
        .map_err(|source| TransformError::Document { position, source })?;
    Ok(ContentItem {
        document,
        highlight: if highlight {
            convert_highlight(hit.highlight)
        } else {
            None
        },
    })
}

fn facet_counts(aggregation: Option<&EsAggregation>) -> Vec<FacetCount> {
    aggregation
        .map(|agg| {
            agg.buckets
                .iter()
                .map(|b| FacetCount {
                    facet: b.key.clone(),
                    count: b.doc_count,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Dimension facets, labelled from the first item carrying that dimension
fn dimension_counts(aggregation: Option<&EsAggregation>, items: &[ContentItem]) -> Vec<LabelledCount> {
    let Some(agg) = aggregation else {
        return Vec::new();
    };
    agg.buckets
        .iter()
        .map(|b| {
            let label = items
                .iter()
                .flat_map(|item| item.document.dimensions.iter())
                .find(|d| d.name == b.key)
                .map(|d| d.label.clone())
                .unwrap_or_default();
            LabelledCount {
                facet: b.key.clone(),
                label,
                count: b.doc_count,
            }
        })
        .collect()
}

fn population_type_counts(
    aggregation: Option<&EsAggregation>,
    items: &[ContentItem],
) -> Vec<LabelledCount> {
    let Some(agg) = aggregation else {
        return Vec::new();
    };
    agg.buckets
        .iter()
        .map(|b| {
            let label = items
                .iter()
                .filter_map(|item| item.document.population_type.as_ref())
                .find(|p| p.name == b.key)
                .map(|p| p.label.clone())
                .unwrap_or_default();
            LabelledCount {
                facet: b.key.clone(),
                label,
                count: b.doc_count,
            }
        })
        .collect()
}

fn suggestions(response: &EsResponse) -> (Vec<String>, Vec<String>) {
    let mut primary = Vec::new();
    let mut additional = Vec::new();
    for (name, entries) in &response.suggest {
        let target = if name == SEARCH_SUGGESTER {
            &mut primary
        } else {
            &mut additional
        };
        for entry in entries {
            target.extend(entry.options.iter().map(|o| o.text.clone()));
        }
    }
    (primary, additional)
}

fn check_failed(name: SubQuery, response: &EsResponse) -> Result<(), TransformError> {
    match &response.error {
        Some(error) => Err(TransformError::SubQueryFailed {
            name: name.to_string(),
            reason: error.to_string(),
        }),
        None => Ok(()),
    }
}

/// Shape a content multi-search response.
///
/// `sub_queries` names the responses in order; when it is empty the single
/// response is taken as the content response. `count` is the hit total of
/// the first response.
pub fn transform_search(
    raw: &[u8],
    sub_queries: &[SubQuery],
    highlight: bool,
) -> Result<SearchResponse, TransformError> {
    let envelope: EsMultiResponse = serde_json::from_slice(raw)?;
    if envelope.responses.is_empty() {
        return Err(TransformError::EmptyResponses);
    }

    let took = envelope.responses.iter().map(|r| r.took).sum();
    let count = envelope.responses[0].hits.total;

    let names: Vec<SubQuery> = if sub_queries.is_empty() {
        vec![SubQuery::Content]
    } else {
        sub_queries.to_vec()
    };
    let mut named: HashMap<SubQuery, EsResponse> =
        names.into_iter().zip(envelope.responses).collect();

    let mut content = named.remove(&SubQuery::Content).unwrap_or_default();
    check_failed(SubQuery::Content, &content)?;
    let hits = std::mem::take(&mut content.hits.hits);

    let (suggestions, additional_suggestions) = suggestions(&content);
    let facets_source = match named.get(&SubQuery::Counts) {
        Some(counts) => {
            check_failed(SubQuery::Counts, counts)?;
            counts
        }
        None => &content,
    };

    let items = hits
        .into_iter()
        .enumerate()
        .map(|(pos, hit)| content_item(pos, hit, highlight))
        .collect::<Result<Vec<_>, _>>()?;

    let content_types = facet_counts(facets_source.aggregation(CONTENT_TYPE_AGGS));
    let topics = facet_counts(facets_source.aggregation(TOPIC_AGGS));
    let dimensions = dimension_counts(facets_source.aggregation(&["dimensions"]), &items);
    let population_type =
        population_type_counts(facets_source.aggregation(&["population_type"]), &items);

    let featured_result = match named.remove(&SubQuery::Featured) {
        Some(featured) => {
            check_failed(SubQuery::Featured, &featured)?;
            featured
                .hits
                .hits
                .into_iter()
                .next()
                .map(|hit| content_item(0, hit, highlight))
                .transpose()?
        }
        None => None,
    };

    let departments = match named.remove(&SubQuery::Departments) {
        Some(response) => {
            check_failed(SubQuery::Departments, &response)?;
            let items = response
                .hits
                .hits
                .into_iter()
                .map(|hit| DepartmentItem {
                    fields: match hit.source {
                        serde_json::Value::Object(map) => map,
                        _ => serde_json::Map::new(),
                    },
                    highlight: if highlight {
                        convert_highlight(hit.highlight)
                    } else {
                        None
                    },
                })
                .collect();
            Some(Departments {
                count: response.hits.total,
                items,
            })
        }
        None => None,
    };

    Ok(SearchResponse {
        took,
        count,
        content_types,
        topics,
        population_type,
        dimensions,
        items,
        suggestions,
        additional_suggestions,
        featured_result,
        departments,
    })
}
