/// In-memory BM25 keyword index for full-text search
use crate::corpus::{Document, Fields};
use crate::embedding::Tokenizer;
use ahash::{AHashMap, AHashSet};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Keyword index has not been built yet")]
    NotReady,
}

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f64,
    /// Length normalization strength
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Search result with ID and relevance score
#[derive(Debug, Clone)]
pub struct KeywordSearchResult {
    /// Document id
    pub id: String,
    /// Document body
    pub text: String,
    /// Document fields
    pub fields: Fields,
    /// BM25 relevance score (always > 0)
    pub score: f64,
    /// 1-based position in the result list
    pub rank: usize,
}

/// One fully built index generation. Never mutated after construction.
#[derive(Debug)]
struct Snapshot {
    documents: Vec<Document>,
    /// term -> [(doc position, term frequency)]
    postings: AHashMap<String, Vec<(usize, u32)>>,
    idf: AHashMap<String, f64>,
    doc_lengths: Vec<usize>,
    avg_doc_len: f64,
}

impl Snapshot {
    fn build(tokenizer: &Tokenizer, documents: Vec<Document>) -> Self {
        let mut postings: AHashMap<String, Vec<(usize, u32)>> = AHashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());

        for (position, document) in documents.iter().enumerate() {
            let tokens = tokenizer.tokenize(&document.text);
            doc_lengths.push(tokens.len());

            let mut term_freqs: AHashMap<String, u32> = AHashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for (term, freq) in term_freqs {
                postings.entry(term).or_default().push((position, freq));
            }
        }

        let n = documents.len() as f64;
        let idf = postings
            .iter()
            .map(|(term, list)| {
                let df = list.len() as f64;
                (term.clone(), (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        let total_len: usize = doc_lengths.iter().sum();
        let avg_doc_len = if documents.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        Self {
            documents,
            postings,
            idf,
            doc_lengths,
            avg_doc_len,
        }
    }

    fn scores(&self, terms: &[String], params: Bm25Params) -> Vec<f64> {
        let mut scores = vec![0.0; self.documents.len()];
        let avg_len = self.avg_doc_len.max(1.0);

        for term in terms {
            let (Some(list), Some(idf)) = (self.postings.get(term), self.idf.get(term)) else {
                continue;
            };
            for &(position, tf) in list {
                let tf = f64::from(tf);
                let doc_len = self.doc_lengths[position] as f64;
                let norm = params.k1 * (1.0 - params.b + params.b * doc_len / avg_len);
                scores[position] += idf * tf * (params.k1 + 1.0) / (tf + norm);
            }
        }

        scores
    }
}

/// BM25 keyword index
///
/// Rebuilding constructs a complete new snapshot before swapping it in, so a
/// concurrent `search` sees either the previous generation or the new one.
pub struct KeywordIndex {
    tokenizer: Tokenizer,
    params: Bm25Params,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl KeywordIndex {
    /// Create an empty, not-yet-ready index
    pub fn new(params: Bm25Params) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            params,
            current: RwLock::new(None),
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Replace the index contents with `documents`
    pub fn index(&self, documents: Vec<Document>) {
        tracing::info!("Indexing {} documents for keyword search", documents.len());

        let snapshot = Arc::new(Snapshot::build(&self.tokenizer, documents));
        let terms = snapshot.postings.len();
        let count = snapshot.documents.len();

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);

        tracing::info!("Keyword index ready: {} documents, {} terms", count, terms);
    }

    /// Search the index
    ///
    /// # Arguments
    /// * `query` - Free text; tokenized the same way as documents
    /// * `top_k` - Maximum number of results
    ///
    /// # Returns
    /// Results with positive score, best first; equal scores keep corpus order
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        let snapshot = self.snapshot().ok_or(KeywordIndexError::NotReady)?;

        let mut seen = AHashSet::new();
        let terms: Vec<String> = self
            .tokenizer
            .tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        if terms.is_empty() {
            tracing::debug!("Query produced no tokens: {:?}", query);
            return Ok(Vec::new());
        }

        let scores = snapshot.scores(&terms, self.params);

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        // sort_by is stable: ties stay in corpus order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);

        let results = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (position, score))| {
                let document = &snapshot.documents[position];
                KeywordSearchResult {
                    id: document.id.clone(),
                    text: document.text.clone(),
                    fields: document.fields.clone(),
                    score,
                    rank: i + 1,
                }
            })
            .collect();

        Ok(results)
    }

    /// True once `index` has completed at least once
    pub fn is_ready(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Get the number of documents in the current generation
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |s| s.documents.len())
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the documents in the current generation
    pub fn documents(&self) -> Vec<Document> {
        self.snapshot()
            .map(|s| s.documents.clone())
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> Document {
        Document::new(id, text, Fields::new())
    }

    fn sample() -> Vec<Document> {
        vec![
            doc("1", "Sốt xuất huyết gây sốt cao và đau đầu"),
            doc("2", "Cảm cúm gây ho và sổ mũi"),
            doc("3", "Viêm họng gây đau họng và ho"),
        ]
    }

    #[test]
    fn test_not_ready_before_index() {
        let index = KeywordIndex::default();
        assert!(!index.is_ready());
        assert!(index.is_empty());
        assert!(matches!(
            index.search("sốt", 5),
            Err(KeywordIndexError::NotReady)
        ));
    }

    #[test]
    fn test_insert_and_search() {
        let index = KeywordIndex::default();
        index.index(sample());

        assert!(index.is_ready());
        assert_eq!(index.len(), 3);

        let results = index.search("sốt", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");
        assert_eq!(results[0].rank, 1);
        assert!(results[0].score > 0.0);

        let results = index.search("ho", 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_empty_token_query_returns_nothing() {
        let index = KeywordIndex::default();
        index.index(sample());

        assert!(index.search("", 10).unwrap().is_empty());
        assert!(index.search("là và của ?!", 10).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_truncation() {
        let index = KeywordIndex::default();
        index.index(sample());

        let results = index.search("gây", 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = KeywordIndex::default();
        index.index(vec![
            doc("b", "đau bụng"),
            doc("a", "đau bụng"),
            doc("c", "đau bụng"),
        ]);

        let ids: Vec<String> = index
            .search("bụng", 10)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_term_frequency_ranks_higher() {
        let index = KeywordIndex::default();
        index.index(vec![
            doc("once", "sốt nhẹ buổi chiều kèm mệt mỏi"),
            doc("twice", "sốt cao sốt kéo dài kèm mệt mỏi"),
        ]);

        let results = index.search("sốt", 10).unwrap();
        assert_eq!(results[0].id, "twice");
    }

    #[test]
    fn test_duplicate_query_terms_count_once() {
        let index = KeywordIndex::default();
        index.index(sample());

        let single = index.search("sốt", 10).unwrap();
        let repeated = index.search("sốt sốt sốt", 10).unwrap();
        assert!((single[0].score - repeated[0].score).abs() < 1e-12);
    }

    #[test]
    fn test_reindex_replaces_previous_generation() {
        let index = KeywordIndex::default();
        index.index(sample());
        index.index(vec![doc("9", "tiêm chủng vắc xin")]);

        assert_eq!(index.len(), 1);
        assert!(index.search("sốt", 10).unwrap().is_empty());
        assert_eq!(index.search("vắc xin", 10).unwrap()[0].id, "9");
    }

    #[test]
    fn test_empty_corpus_is_ready() {
        let index = KeywordIndex::default();
        index.index(Vec::new());

        assert!(index.is_ready());
        assert!(index.search("sốt", 10).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_search_during_reindex() {
        let index = Arc::new(KeywordIndex::default());
        index.index(sample());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let results = index.search("ho", 10).unwrap();
                        // Either generation: old has 2 hits, new has 3
                        assert!(results.len() == 2 || results.len() == 3);
                    }
                })
            })
            .collect();

        let mut bigger = sample();
        bigger.push(doc("4", "ho khan về đêm"));
        for _ in 0..50 {
            index.index(bigger.clone());
            index.index(sample());
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
