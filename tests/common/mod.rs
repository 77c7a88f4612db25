//! Test doubles shared by the integration tests
#![allow(dead_code)]

use medisearch::corpus::{Document, Fields};
use medisearch::embedding::{
    EmbeddingError, EmbeddingProvider, Tokenizer, VectorEntry, VectorHit, VectorStore,
    VectorStoreError,
};
use medisearch::generation::{GeneratedResponse, GenerationError, ResponseGenerator};
use medisearch::retrieval::{Confidence, RequestContext, ScoredResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Small Vietnamese disease corpus
pub fn sample_corpus() -> Vec<Document> {
    vec![
        Document::from_fields(
            "sot-xuat-huyet",
            fields(&[
                ("disease_name", "Sốt xuất huyết"),
                ("symptoms", "Sốt cao đột ngột, đau đầu, đau hốc mắt, phát ban"),
                ("treatment", "Nghỉ ngơi, uống nhiều nước, hạ sốt bằng paracetamol"),
                ("prevention", "Diệt muỗi, ngủ màn, vệ sinh môi trường"),
            ]),
        ),
        Document::from_fields(
            "cum",
            fields(&[
                ("disease_name", "Cúm mùa"),
                ("symptoms", "Sốt, ho, đau họng, sổ mũi, mệt mỏi"),
                ("treatment", "Nghỉ ngơi, uống thuốc hạ sốt, bổ sung nước"),
                ("prevention", "Tiêm vắc-xin cúm hằng năm, rửa tay thường xuyên"),
            ]),
        ),
        Document::from_fields(
            "dau-da-day",
            fields(&[
                ("disease_name", "Viêm loét dạ dày"),
                ("symptoms", "Đau thượng vị, ợ chua, buồn nôn"),
                ("treatment", "Thuốc ức chế bơm proton, ăn uống điều độ"),
                ("prevention", "Tránh rượu bia, ăn đúng giờ"),
            ]),
        ),
        Document::from_fields(
            "tieu-duong",
            fields(&[
                ("disease_name", "Tiểu đường type 2"),
                ("symptoms", "Khát nước nhiều, tiểu nhiều, sụt cân"),
                ("treatment", "Kiểm soát đường huyết, dùng metformin theo chỉ định"),
                ("diagnosis", "Xét nghiệm đường huyết lúc đói và HbA1c"),
            ]),
        ),
    ]
}

/// Hashed bag-of-words embedder
///
/// Texts sharing tokens get nearby vectors; no model download needed.
pub struct BagOfWordsEmbedder {
    tokenizer: Tokenizer,
    dimension: usize,
    pub calls: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in self.tokenizer.tokenize(text) {
            let hash = blake3::hash(token.as_bytes());
            let bucket = u64::from_le_bytes(
                hash.as_bytes()[..8]
                    .try_into()
                    .expect("blake3 digests are 32 bytes"),
            ) as usize
                % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl EmbeddingProvider for BagOfWordsEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}

/// Embedder that always fails
pub struct BrokenEmbedder;

impl EmbeddingProvider for BrokenEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("model unavailable".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("model unavailable".to_string()))
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "broken"
    }
}

/// Vector store returning preset distances regardless of the query vector
///
/// Hits come back sorted by distance; equal distances keep insertion order.
#[derive(Default)]
pub struct FixedDistanceStore {
    entries: Mutex<Vec<VectorHit>>,
    distances: HashMap<String, f32>,
    pub queries: AtomicUsize,
}

impl FixedDistanceStore {
    pub fn new(hits: Vec<(&str, f32, Fields)>) -> Self {
        let distances = hits
            .iter()
            .map(|(id, distance, _)| (id.to_string(), *distance))
            .collect();
        let entries = hits
            .into_iter()
            .map(|(id, distance, metadata)| VectorHit {
                id: id.to_string(),
                metadata,
                distance,
            })
            .collect();

        Self {
            entries: Mutex::new(entries),
            distances,
            queries: AtomicUsize::new(0),
        }
    }
}

impl VectorStore for FixedDistanceStore {
    fn query(&self, _vector: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut hits = self.entries.lock().unwrap().clone();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits.truncate(k);
        Ok(hits)
    }

    fn add(&self, entries: Vec<VectorEntry>) -> Result<(), VectorStoreError> {
        let mut stored = self.entries.lock().unwrap();
        for entry in entries {
            let distance = self.distances.get(&entry.id).copied().unwrap_or(5.0);
            stored.push(VectorHit {
                id: entry.id,
                metadata: entry.metadata,
                distance,
            });
        }
        Ok(())
    }

    fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.entries.lock().unwrap().len())
    }
}

/// Generator that lists the disease names of the results it was given
#[derive(Default)]
pub struct ListingGenerator {
    pub calls: AtomicUsize,
}

impl ResponseGenerator for ListingGenerator {
    fn generate(
        &self,
        _query: &str,
        results: &[ScoredResult],
        _features: &Fields,
        _context: &RequestContext,
    ) -> Result<GeneratedResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let names: Vec<&str> = results.iter().map(|r| r.field("disease_name")).collect();
        let confidence = results
            .first()
            .map(|r| r.confidence)
            .unwrap_or(Confidence::Low);

        Ok(GeneratedResponse::new(
            names.join(", "),
            confidence,
            results.iter().map(|r| r.id.clone()).collect(),
        ))
    }
}

/// Generator that always fails
pub struct FailingGenerator;

impl ResponseGenerator for FailingGenerator {
    fn generate(
        &self,
        _query: &str,
        _results: &[ScoredResult],
        _features: &Fields,
        _context: &RequestContext,
    ) -> Result<GeneratedResponse, GenerationError> {
        Err(GenerationError::GenerationFailed("upstream timeout".to_string()))
    }
}

/// Generator that addresses the user and names the conversation
pub struct PersonalGenerator;

impl ResponseGenerator for PersonalGenerator {
    fn generate(
        &self,
        _query: &str,
        results: &[ScoredResult],
        _features: &Fields,
        context: &RequestContext,
    ) -> Result<GeneratedResponse, GenerationError> {
        let greeting = context.user_name.as_deref().unwrap_or("bạn");
        let conversation = context.conversation_id.as_deref().unwrap_or("-");
        Ok(GeneratedResponse::new(
            format!("[{conversation}] Chào {greeting}"),
            Confidence::Medium,
            results.iter().map(|r| r.id.clone()).collect(),
        ))
    }
}
