//! Re-projection of CMS page bodies onto the indexed document shape

use crate::models::{CmsDocument, Document, IndexedDocument};

/// A document ready for the bulk indexer
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedDocument {
    pub id: String,
    pub body: String,
}

/// Decode a CMS page and encode it as the document stored in the index.
///
/// The page's own `uri` wins; the URI it was fetched under fills it in
/// when the page omits one.
pub fn transform_document(doc: &Document) -> Result<TransformedDocument, serde_json::Error> {
    let cms: CmsDocument = serde_json::from_slice(&doc.body)?;
    let mut indexed = IndexedDocument::from(cms);
    if indexed.uri.is_empty() {
        indexed.uri = doc.uri.clone();
    }

    Ok(TransformedDocument {
        id: doc.id.clone(),
        body: serde_json::to_string(&indexed)?,
    })
}
