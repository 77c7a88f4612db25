//! Hybrid search combining vector retrieval, keyword overlap and domain scoring

use crate::cache::{cache_key_bounded, CacheManager, CacheStats};
use crate::config::{CacheConfig, Config};
use crate::corpus::{Document, Fields};
use crate::embedding::{
    Bm25Params, EmbeddingProvider, KeywordIndex, KeywordSearchResult, VectorEntry, VectorHit,
    VectorStore,
};
use crate::generation::{GeneratedResponse, RequestContext, ResponseGenerator};
use crate::retrieval::{
    deduplicate_hits, deduplicate_results, expanded_queries, CrossEncoder, FusionConfig,
    QueryExpander, Reranker, ScoreFusion, ScoredResult, SearchQuery, SearchResponse,
};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Message returned when the vector store holds no documents
pub const EMPTY_CORPUS_MESSAGE: &str = "No data in database";

/// Fields joined into the passage a cross-encoder reads
const RERANK_FIELDS: &[&str] = &["disease_name", "symptoms", "treatment"];

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Keyword index is not ready")]
    IndexNotReady,

    #[error("{}", EMPTY_CORPUS_MESSAGE)]
    EmptyCorpus,

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),

    #[error("Response generation failed: {0}")]
    Generation(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Values stored in the shared cache
#[derive(Debug, Clone)]
pub enum CachedPayload {
    Search(SearchResponse),
    Response(GeneratedResponse),
}

/// Search results plus the composed answer
#[derive(Debug, Clone)]
pub struct Answer {
    pub search: SearchResponse,
    pub response: GeneratedResponse,
}

impl Answer {
    pub fn fully_cached(&self) -> bool {
        self.search.from_cache && self.response.from_cache
    }
}

/// Candidates gathered for one request
struct Candidates {
    hits: Vec<VectorHit>,
    phrasings: usize,
}

/// Hybrid searcher with an explicit result cache
pub struct HybridSearcher {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    keyword_index: KeywordIndex,
    fusion: ScoreFusion,
    reranker: Option<Reranker>,
    expander: Option<Arc<dyn QueryExpander>>,
    cache: Arc<CacheManager<CachedPayload>>,
    cache_config: CacheConfig,
    candidate_multiplier: usize,
    rerank_weight: f64,
    max_alternatives: usize,
    batch_size: usize,
    /// Held while the vector store and keyword index are updated together
    ingest_lock: Mutex<()>,
}

impl HybridSearcher {
    /// Create a searcher over the given collaborators
    ///
    /// No cross-encoder or query expander is attached; see
    /// [`HybridSearcher::with_cross_encoder`] and
    /// [`HybridSearcher::with_query_expander`].
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        cache: Arc<CacheManager<CachedPayload>>,
        config: &Config,
    ) -> Result<Self, SearchError> {
        let fusion_config = FusionConfig::from_retrieval(&config.retrieval)
            .map_err(|e| SearchError::Configuration(e.to_string()))?;

        let keyword_index = KeywordIndex::new(Bm25Params {
            k1: config.keyword.bm25_k1,
            b: config.keyword.bm25_b,
        });
        let fusion = ScoreFusion::new(fusion_config, keyword_index.tokenizer().clone());

        Ok(Self {
            embedding_provider,
            vector_store,
            keyword_index,
            fusion,
            reranker: None,
            expander: None,
            cache,
            cache_config: config.cache.clone(),
            candidate_multiplier: config.retrieval.candidate_multiplier.max(1),
            rerank_weight: config.reranking.cross_encoder_weight,
            max_alternatives: config.expansion.max_alternatives,
            batch_size: config.embedding.batch_size.max(1),
            ingest_lock: Mutex::new(()),
        })
    }

    /// Enable the cross-encoder rerank stage
    pub fn with_cross_encoder(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        tracing::info!("Cross-encoder reranking enabled: {}", encoder.model_name());
        self.reranker = Some(Reranker::new(encoder, self.rerank_weight));
        self
    }

    /// Also search alternative phrasings produced by `expander`
    pub fn with_query_expander(mut self, expander: Arc<dyn QueryExpander>) -> Self {
        tracing::info!("Query expansion enabled: {}", expander.name());
        self.expander = Some(expander);
        self
    }

    /// Build the keyword index from `documents`, replacing the previous one
    ///
    /// The vector store is expected to hold embeddings of the same corpus.
    /// Cached results are dropped.
    pub fn index_documents(&self, documents: Vec<Document>) -> usize {
        let _guard = self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let count = documents.len();
        self.keyword_index.index(documents);
        self.cache.clear();
        count
    }

    /// Embed `documents`, add them to the vector store and reindex keywords
    ///
    /// Documents already in the keyword index are kept, so both indexes
    /// cover the same corpus after every successful call, including
    /// concurrent ones. Cached results are dropped.
    pub fn ingest(&self, documents: Vec<Document>) -> Result<usize, SearchError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let mut entries = Vec::with_capacity(documents.len());

        for batch in documents.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self
                .embedding_provider
                .embed_batch(&texts)
                .map_err(|e| SearchError::Indexing(e.to_string()))?;

            if vectors.len() != batch.len() {
                return Err(SearchError::Indexing(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            entries.extend(batch.iter().zip(vectors).map(|(document, vector)| VectorEntry {
                id: document.id.clone(),
                vector,
                metadata: document.fields.clone(),
            }));
        }

        let added = documents.len();
        {
            let _guard = self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner);

            self.vector_store
                .add(entries)
                .map_err(|e| SearchError::Indexing(e.to_string()))?;

            let mut corpus = self.keyword_index.documents();
            corpus.extend(documents);
            self.keyword_index.index(corpus);
            self.cache.clear();
        }

        tracing::info!("Ingested {} documents in {:?}", added, start.elapsed());
        Ok(added)
    }

    /// True once the keyword index has been built
    pub fn is_ready(&self) -> bool {
        self.keyword_index.is_ready()
    }

    /// Number of documents in the keyword index
    pub fn indexed_count(&self) -> usize {
        self.keyword_index.len()
    }

    /// BM25-only search over the keyword index
    pub fn keyword_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KeywordSearchResult>, SearchError> {
        self.keyword_index
            .search(query, top_k)
            .map_err(|_| SearchError::IndexNotReady)
    }

    /// Ranked search for `query.text`, at most `query.limit` results; never fails
    ///
    /// Invalid input gives a successful empty response. Collaborator failures
    /// and an empty corpus give `success = false` with a message. Filters do
    /// not change ranking.
    pub fn search(&self, query: &SearchQuery) -> SearchResponse {
        match self.try_search(&query.text, query.limit) {
            Ok(response) => response,
            Err(SearchError::InvalidQuery(message)) => {
                tracing::debug!("Rejected query: {}", message);
                SearchResponse::empty(message)
            }
            Err(SearchError::EmptyCorpus) => {
                tracing::warn!("Search on empty corpus");
                SearchResponse::failure(EMPTY_CORPUS_MESSAGE)
            }
            Err(e) => {
                tracing::warn!("Search failed: {}", e);
                SearchResponse::failure(e.to_string())
            }
        }
    }

    fn try_search(&self, query: &str, top_k: usize) -> Result<SearchResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(SearchError::InvalidQuery(
                "Result limit must be greater than 0".to_string(),
            ));
        }

        let start = Instant::now();

        let count = self
            .vector_store
            .count()
            .map_err(|e| SearchError::Retrieval(e.to_string()))?;
        if count == 0 {
            return Err(SearchError::EmptyCorpus);
        }

        let n_candidates = top_k.saturating_mul(self.candidate_multiplier).min(count);
        let candidates = self.collect_candidates(query, n_candidates)?;
        let total_searched = candidates.hits.len();

        // Candidates from every phrasing are scored against the original question
        let scored = self.fusion.score_all(query, candidates.hits);
        let (scored, reranking_used) = self.rerank(query, scored, top_k);
        let scored = deduplicate_results(scored);
        let results = self.fusion.select(scored, top_k);

        tracing::info!(
            "Search returned {}/{} candidates from {} phrasing(s) in {:?}",
            results.len(),
            total_searched,
            candidates.phrasings,
            start.elapsed()
        );

        Ok(SearchResponse {
            query_expansion_used: candidates.phrasings > 1,
            ..SearchResponse::found(results, total_searched, reranking_used)
        })
    }

    /// Query the vector store for the original question and its alternatives
    ///
    /// The original must succeed. A failing alternative is skipped.
    fn collect_candidates(&self, query: &str, k: usize) -> Result<Candidates, SearchError> {
        let queries = expanded_queries(self.expander.as_deref(), query, self.max_alternatives);

        let mut hits = self.query_store(query, k)?;
        let mut phrasings = 1;

        for alternative in queries.iter().skip(1) {
            match self.query_store(alternative, k) {
                Ok(more) => {
                    hits.extend(more);
                    phrasings += 1;
                }
                Err(e) => tracing::warn!("Skipping expanded query {:?}: {}", alternative, e),
            }
        }

        Ok(Candidates {
            hits: deduplicate_hits(hits),
            phrasings,
        })
    }

    fn query_store(&self, query: &str, k: usize) -> Result<Vec<VectorHit>, SearchError> {
        let embedding = self
            .embedding_provider
            .embed(query)
            .map_err(|e| SearchError::Retrieval(e.to_string()))?;

        self.vector_store
            .query(&embedding, k)
            .map_err(|e| SearchError::Retrieval(e.to_string()))
    }

    /// Rerank the head of `scored`; on failure keep the fused order
    fn rerank(
        &self,
        query: &str,
        mut scored: Vec<ScoredResult>,
        top_k: usize,
    ) -> (Vec<ScoredResult>, bool) {
        let Some(reranker) = &self.reranker else {
            return (scored, false);
        };
        if scored.len() < 2 {
            return (scored, false);
        }

        let head_len = top_k.saturating_mul(2).min(scored.len());
        let tail = scored.split_off(head_len);
        let passages: Vec<String> = scored.iter().map(rerank_passage).collect();

        match reranker.rerank(query, scored.clone(), &passages) {
            Ok(mut reranked) => {
                reranked.extend(tail);
                (reranked, true)
            }
            Err(e) => {
                tracing::warn!("Reranking with {} failed: {}", reranker.model_name(), e);
                scored.extend(tail);
                (scored, false)
            }
        }
    }

    /// Search through the result cache
    ///
    /// Only successful responses are cached. Disabled caching or a
    /// conversation-bound context falls through to [`HybridSearcher::search`].
    pub fn cached_search(&self, query: &SearchQuery, context: &RequestContext) -> SearchResponse {
        if !self.cache_config.enabled || context.bypasses_cache() {
            return self.search(query);
        }

        let key = cache_key_bounded(
            "search",
            &query.text,
            &[("n_results", query.limit.to_string())],
            self.cache_config.max_key_chars,
        );

        if let Some(CachedPayload::Search(mut cached)) = self.cache.get(&key) {
            tracing::info!("Returning cached search results");
            cached.from_cache = true;
            return cached;
        }

        let response = self.search(query);
        if response.success {
            self.cache.set(
                key,
                CachedPayload::Search(response.clone()),
                self.cache_config.ttl_search(),
            );
        }
        response
    }

    /// Compose an answer through the response cache
    ///
    /// Responses with an empty answer are returned but not cached. The
    /// generator always receives `context`.
    pub fn cached_response(
        &self,
        generator: &dyn ResponseGenerator,
        query: &str,
        results: &[ScoredResult],
        features: &Fields,
        context: &RequestContext,
    ) -> Result<GeneratedResponse, SearchError> {
        let generate = || {
            generator
                .generate(query, results, features, context)
                .map_err(|e| SearchError::Generation(e.to_string()))
        };

        if !self.cache_config.enabled || context.bypasses_cache() {
            return generate();
        }

        let key = cache_key_bounded("response", query, &[], self.cache_config.max_key_chars);

        if let Some(CachedPayload::Response(mut cached)) = self.cache.get(&key) {
            tracing::info!("Returning cached response");
            cached.from_cache = true;
            return Ok(cached);
        }

        let response = generate()?;
        if response.has_answer() {
            self.cache.set(
                key,
                CachedPayload::Response(response.clone()),
                self.cache_config.ttl_response(),
            );
        }
        Ok(response)
    }

    /// Full request path: cached search, then cached response composition
    ///
    /// The query's filters reach the generator only; they never change ranking.
    pub fn answer(
        &self,
        query: &SearchQuery,
        generator: &dyn ResponseGenerator,
        context: &RequestContext,
    ) -> Result<Answer, SearchError> {
        let search = self.cached_search(query, context);
        let response = self.cached_response(
            generator,
            &query.text,
            &search.results,
            &query.filters,
            context,
        )?;
        Ok(Answer { search, response })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn reset_cache_stats(&self) {
        self.cache.reset_stats();
    }
}

fn rerank_passage(result: &ScoredResult) -> String {
    RERANK_FIELDS
        .iter()
        .map(|name| result.field(name))
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
