//! Alias cutover and garbage collection of unaliased indices

use super::error::ReindexError;
use crate::elasticsearch::{AliasMap, ElasticSearch, INDEX_PREFIX};
use tracing::{info, warn};

/// Indices carrying the prefix that no longer hold the alias
pub fn unaliased_indices(aliases: &AliasMap, alias: &str) -> Vec<String> {
    let mut stale: Vec<String> = aliases
        .iter()
        .filter(|(index, set)| index.starts_with(INDEX_PREFIX) && !set.contains(alias))
        .map(|(index, _)| index.clone())
        .collect();
    stale.sort();
    stale
}

/// Point the alias at `index` alone, then delete the indices it left.
///
/// The move is a single atomic alias update, so readers always see exactly
/// one aliased index. A failed clean-up is logged and leaves the new alias
/// in place. Returns the deleted index names.
pub async fn flip_alias(es: &dyn ElasticSearch, index: &str) -> Result<Vec<String>, ReindexError> {
    let pattern = format!("{INDEX_PREFIX}*");
    es.update_aliases(INDEX_PREFIX, &[pattern], &[index.to_string()])
        .await
        .map_err(|source| ReindexError::AliasFlip {
            index: index.to_string(),
            source,
        })?;
    info!(alias = INDEX_PREFIX, index = %index, "Alias moved to new index");

    let aliases = match es.get_alias().await {
        Ok(aliases) => aliases,
        Err(e) => {
            warn!(error = %e, "Could not list aliases, skipping clean-up");
            return Ok(Vec::new());
        }
    };

    let stale = unaliased_indices(&aliases, INDEX_PREFIX);
    if stale.is_empty() {
        return Ok(stale);
    }

    match es.delete_indices(&stale).await {
        Ok(()) => {
            info!(count = stale.len(), indices = ?stale, "Deleted old indices");
            Ok(stale)
        }
        Err(e) => {
            warn!(error = %e, indices = ?stale, "Failed to delete old indices");
            Ok(Vec::new())
        }
    }
}
