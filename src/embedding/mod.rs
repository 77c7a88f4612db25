/// Embedding & Indexing
///
/// This module provides the retrieval building blocks the searcher composes:
/// - EmbeddingProvider trait with a FastEmbed implementation
/// - VectorStore trait with an HNSW implementation (L2 distance)
/// - In-memory BM25 keyword index with snapshot swapping on reindex
/// - The tokenizer shared by keyword search and keyword-overlap scoring
mod keyword_index;
mod provider;
mod tokenizer;
mod vector_index;

pub use keyword_index::{Bm25Params, KeywordIndex, KeywordIndexError, KeywordSearchResult};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, SUPPORTED_MODELS};
pub use tokenizer::{Tokenizer, STOP_WORDS};
pub use vector_index::{
    HnswParams, HnswVectorStore, VectorEntry, VectorHit, VectorStore, VectorStoreError,
};
