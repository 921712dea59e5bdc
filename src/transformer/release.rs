//! Release calendar response shaping

use super::error::TransformError;
use super::models::*;
use super::search::document_from_source;
use crate::models::{IndexedDocument, ReleaseType};
use crate::query::{BreakdownCategory, ReleaseSearchRequest};
use std::sync::Arc;

/// Decides whether a calendar entry counts as a census release
pub trait CensusPredicate: Send + Sync {
    fn is_census(&self, document: &IndexedDocument) -> bool;
}

/// Census releases are those whose `survey` is "census"
#[derive(Debug, Clone, Copy, Default)]
pub struct SurveyCensus;

impl CensusPredicate for SurveyCensus {
    fn is_census(&self, document: &IndexedDocument) -> bool {
        document.is_census()
    }
}

impl<F> CensusPredicate for F
where
    F: Fn(&IndexedDocument) -> bool + Send + Sync,
{
    fn is_census(&self, document: &IndexedDocument) -> bool {
        self(document)
    }
}

/// Shapes release calendar multi-search responses
#[derive(Clone)]
pub struct ReleaseTransformer {
    census: Arc<dyn CensusPredicate>,
}

impl Default for ReleaseTransformer {
    fn default() -> Self {
        Self::new(Arc::new(SurveyCensus))
    }
}

impl ReleaseTransformer {
    pub fn new(census: Arc<dyn CensusPredicate>) -> Self {
        Self { census }
    }

    fn release(&self, position: usize, hit: EsHit, highlight: bool) -> Result<Release, TransformError> {
        let doc = document_from_source(hit.source)
            .map_err(|source| TransformError::Document { position, source })?;

        let description = ReleaseDescription {
            postponed: doc.is_postponed(),
            census: self.census.is_census(&doc),
            title: doc.title,
            summary: doc.summary,
            release_date: doc.release_date,
            published: doc.published,
            cancelled: doc.cancelled,
            finalised: doc.finalised,
            keywords: doc.keywords,
            provisional_date: doc.provisional_date,
            language: doc.language,
            canonical_topic: doc.canonical_topic,
            date_changes: doc.date_changes,
        };

        Ok(Release {
            uri: doc.uri,
            description,
            highlight: (highlight && !hit.highlight.is_empty()).then_some(hit.highlight),
        })
    }

    /// Shape the main release response followed by one count response per
    /// entry of `counts`.
    pub fn transform(
        &self,
        raw: &[u8],
        request: &ReleaseSearchRequest,
        counts: &[BreakdownCategory],
    ) -> Result<ReleaseResponse, TransformError> {
        let envelope: EsMultiResponse = serde_json::from_slice(raw)?;
        let took = envelope.responses.iter().map(|r| r.took).sum();
        let mut responses = envelope.responses.into_iter();
        let main = responses.next().ok_or(TransformError::EmptyResponses)?;
        if let Some(error) = &main.error {
            return Err(TransformError::SubQueryFailed {
                name: "releases".to_string(),
                reason: error.to_string(),
            });
        }

        let mut breakdown = Breakdown {
            total: main.hits.total,
            ..Default::default()
        };
        let count_responses: Vec<EsResponse> = responses.collect();
        if count_responses.is_empty() {
            fill_from_request(&mut breakdown, request);
        } else {
            for (category, response) in counts.iter().zip(count_responses) {
                if let Some(error) = &response.error {
                    return Err(TransformError::SubQueryFailed {
                        name: category.to_string(),
                        reason: error.to_string(),
                    });
                }
                *breakdown_slot(&mut breakdown, *category) = response.hits.total;
            }
        }

        let releases = main
            .hits
            .hits
            .into_iter()
            .enumerate()
            .map(|(pos, hit)| self.release(pos, hit, request.highlight))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReleaseResponse {
            took,
            limit: request.size,
            offset: request.from,
            breakdown,
            releases,
        })
    }
}

fn breakdown_slot(breakdown: &mut Breakdown, category: BreakdownCategory) -> &mut u64 {
    match category {
        BreakdownCategory::Provisional => &mut breakdown.provisional,
        BreakdownCategory::Confirmed => &mut breakdown.confirmed,
        BreakdownCategory::Postponed => &mut breakdown.postponed,
        BreakdownCategory::Published => &mut breakdown.published,
        BreakdownCategory::Cancelled => &mut breakdown.cancelled,
        BreakdownCategory::Census => &mut breakdown.census,
    }
}

/// Without count responses, attribute the total to the requested type and sub-types
fn fill_from_request(breakdown: &mut Breakdown, request: &ReleaseSearchRequest) {
    let total = breakdown.total;
    match request.release_type {
        ReleaseType::Published => breakdown.published = total,
        ReleaseType::Cancelled => breakdown.cancelled = total,
        ReleaseType::Upcoming => {
            if request.provisional {
                breakdown.provisional = total;
            }
            if request.confirmed {
                breakdown.confirmed = total;
            }
            if request.postponed {
                breakdown.postponed = total;
            }
        }
    }
    if request.census {
        breakdown.census = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn hit(uri: &str, finalised: bool, date_changes: bool, survey: &str) -> serde_json::Value {
        let changes = if date_changes {
            json!([{"change_notice": "moved", "previous_date": "2024-01-01"}])
        } else {
            json!([])
        };
        json!({
            "_source": {
                "type": "release", "uri": uri, "title": "Release", "finalised": finalised,
                "date_changes": changes, "survey": survey
            },
            "highlight": {"title": ["<em class=\"highlight\">Release</em>"]}
        })
    }

    fn envelope(main_total: u64, hits: Vec<serde_json::Value>, counts: &[u64]) -> Vec<u8> {
        let mut responses = vec![json!({"took": 5, "hits": {"total": main_total, "hits": hits}})];
        responses.extend(
            counts
                .iter()
                .map(|n| json!({"took": 1, "hits": {"total": n, "hits": []}})),
        );
        json!({ "responses": responses }).to_string().into_bytes()
    }

    #[test]
    fn test_breakdown_from_count_responses() {
        let categories: Vec<BreakdownCategory> = BreakdownCategory::iter().collect();
        let raw = envelope(3, vec![], &[1, 2, 3, 4, 5, 6]);
        let resp = ReleaseTransformer::default()
            .transform(&raw, &ReleaseSearchRequest::default(), &categories)
            .unwrap();

        assert_eq!(
            resp.breakdown,
            Breakdown {
                total: 3,
                provisional: 1,
                confirmed: 2,
                postponed: 3,
                published: 4,
                cancelled: 5,
                census: 6,
            }
        );
        assert_eq!(resp.took, 11);
        assert_eq!(resp.limit, 10);
        assert_eq!(resp.offset, 0);
    }

    #[test]
    fn test_breakdown_fallback() {
        let raw = envelope(4, vec![], &[]);
        let req = ReleaseSearchRequest {
            release_type: ReleaseType::Upcoming,
            confirmed: true,
            ..Default::default()
        };
        let resp = ReleaseTransformer::default().transform(&raw, &req, &[]).unwrap();
        assert_eq!(resp.breakdown.total, 4);
        assert_eq!(resp.breakdown.confirmed, 4);
        assert_eq!(resp.breakdown.published, 0);
    }

    #[test]
    fn test_postponed_and_census() {
        let raw = envelope(
            3,
            vec![
                hit("/a", true, true, "census"),
                hit("/b", true, false, ""),
                hit("/c", false, true, ""),
            ],
            &[],
        );
        let resp = ReleaseTransformer::default()
            .transform(&raw, &ReleaseSearchRequest::default(), &[])
            .unwrap();

        let flags: Vec<(bool, bool)> = resp
            .releases
            .iter()
            .map(|r| (r.description.postponed, r.description.census))
            .collect();
        assert_eq!(flags, vec![(true, true), (false, false), (false, false)]);
    }

    #[test]
    fn test_pluggable_census_predicate() {
        let raw = envelope(1, vec![hit("/a", false, false, "census")], &[]);
        let never = ReleaseTransformer::new(Arc::new(|_: &IndexedDocument| false));
        let resp = never
            .transform(&raw, &ReleaseSearchRequest::default(), &[])
            .unwrap();
        assert!(!resp.releases[0].description.census);
    }

    #[test]
    fn test_highlight_kept_verbatim() {
        let raw = envelope(1, vec![hit("/a", false, false, "")], &[]);
        let resp = ReleaseTransformer::default()
            .transform(&raw, &ReleaseSearchRequest::default(), &[])
            .unwrap();
        let highlight = resp.releases[0].highlight.as_ref().unwrap();
        assert_eq!(highlight["title"][0], "<em class=\"highlight\">Release</em>");

        let req = ReleaseSearchRequest {
            highlight: false,
            ..Default::default()
        };
        let resp = ReleaseTransformer::default().transform(&raw, &req, &[]).unwrap();
        assert!(resp.releases[0].highlight.is_none());
    }

    #[test]
    fn test_empty_and_malformed() {
        let t = ReleaseTransformer::default();
        let req = ReleaseSearchRequest::default();
        assert!(matches!(
            t.transform(br#"{"responses":[]}"#, &req, &[]),
            Err(TransformError::EmptyResponses)
        ));
        assert!(matches!(
            t.transform(b"<html>", &req, &[]),
            Err(TransformError::Decode(_))
        ));
    }
}
