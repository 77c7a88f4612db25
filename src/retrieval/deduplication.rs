//! Result deduplication by document id

use crate::embedding::VectorHit;
use crate::retrieval::ScoredResult;
use ahash::AHashSet;

/// Merge vector hits gathered from several queries, keeping the first hit per id
pub fn deduplicate_hits(hits: Vec<VectorHit>) -> Vec<VectorHit> {
    let mut seen: AHashSet<String> = AHashSet::with_capacity(hits.len());

    hits.into_iter()
        .filter(|hit| seen.insert(hit.id.clone()))
        .collect()
}

/// Deduplicate results by id, keeping the first (highest ranked) instance
pub fn deduplicate_results(results: Vec<ScoredResult>) -> Vec<ScoredResult> {
    let mut seen: AHashSet<String> = AHashSet::with_capacity(results.len());

    results
        .into_iter()
        .filter(|result| seen.insert(result.id.clone()))
        .collect()
}
