//! Hybrid Retrieval & Ranking
//!
//! Candidates come from the vector store, optionally for several phrasings of
//! the question. They get fused scores from semantic distance, keyword overlap
//! and domain heuristics, are optionally reranked by a cross-encoder, then
//! filtered by confidence and cached.

mod deduplication;
mod expansion;
mod fusion;
mod hybrid;
mod reranker;
mod scored;

pub use deduplication::{deduplicate_hits, deduplicate_results};
pub use expansion::{expanded_queries, ExpansionError, QueryExpander, SynonymExpander};
pub use fusion::{
    fuse, jaccard, semantic_similarity, FusionConfig, FusionError, ScoreFusion, DOMAIN_WEIGHT,
    KEYWORD_WEIGHT, SEMANTIC_WEIGHT,
};
pub use hybrid::{Answer, CachedPayload, HybridSearcher, SearchError, EMPTY_CORPUS_MESSAGE};
pub use reranker::{CrossEncoder, FastEmbedReranker, RerankError, Reranker, SUPPORTED_RERANKERS};
pub use scored::{Confidence, ScoreBreakdown, ScoredResult, SearchResponse};

pub use crate::generation::RequestContext;

use crate::corpus::Fields;
use serde::{Deserialize, Serialize};

/// Search query with extracted features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Maximum number of results
    pub limit: usize,

    /// Features extracted from the query, handed to response generation.
    /// They do not influence ranking.
    #[serde(default)]
    pub filters: Fields,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            filters: Fields::new(),
        }
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }
}
