//! Cross-encoder reranking using FastEmbed

use crate::retrieval::ScoredResult;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

/// Reranker models accepted in configuration
pub const SUPPORTED_RERANKERS: &[&str] = &["bge-reranker-v2-m3", "bge-reranker-base"];

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Expected {expected} scores, got {actual}")]
    ScoreCountMismatch { expected: usize, actual: usize },
}

/// Scores (query, passage) pairs jointly
///
/// Implementations return one relevance score per passage, in input order.
/// Scores are expected in `[0, 1]`; larger is more relevant.
pub trait CrossEncoder: Send + Sync {
    fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;
}

fn lookup_model(name: &str) -> Option<RerankerModel> {
    match name.to_lowercase().as_str() {
        "bge-reranker-v2-m3" => Some(RerankerModel::BGERerankerV2M3),
        "bge-reranker-base" => Some(RerankerModel::BGERerankerBase),
        _ => None,
    }
}

/// FastEmbed-backed cross-encoder
pub struct FastEmbedReranker {
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedReranker {
    /// Create a reranker for one of [`SUPPORTED_RERANKERS`]
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let model_kind = lookup_model(model_name).ok_or_else(|| {
            RerankError::InitializationError(format!(
                "Unsupported reranker model '{}', expected one of {:?}",
                model_name, SUPPORTED_RERANKERS
            ))
        })?;

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(model_kind).with_show_download_progress(true);
        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }
}

impl CrossEncoder for FastEmbedReranker {
    fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let documents: Vec<&str> = passages.iter().map(|s| s.as_str()).collect();
        let results = self
            .model
            .rerank(query, documents, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // FastEmbed returns results sorted by score; put them back in input order
        let mut scores = vec![0.0_f32; passages.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = sigmoid(result.score);
            }
        }
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// BGE rerankers emit logits
fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

/// Reorders scored results with a cross-encoder
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
    weight: f64,
}

impl Reranker {
    /// `weight` is the share of the cross-encoder score in the blend
    pub fn new(encoder: Arc<dyn CrossEncoder>, weight: f64) -> Self {
        Self {
            encoder,
            weight: weight.clamp(0.0, 1.0),
        }
    }

    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Blend cross-encoder scores into `results` and sort by the blend
    ///
    /// `rerank_score = weight * ce + (1 - weight) * final`. The fused
    /// breakdown and confidence are left untouched.
    pub fn rerank(
        &self,
        query: &str,
        mut results: Vec<ScoredResult>,
        passages: &[String],
    ) -> Result<Vec<ScoredResult>, RerankError> {
        if results.len() != passages.len() {
            return Err(RerankError::InvalidInput(format!(
                "{} results but {} passages",
                results.len(),
                passages.len()
            )));
        }

        let scores = self.encoder.rerank(query, passages)?;
        if scores.len() != results.len() {
            return Err(RerankError::ScoreCountMismatch {
                expected: results.len(),
                actual: scores.len(),
            });
        }

        for (result, ce) in results.iter_mut().zip(scores) {
            let ce = f64::from(ce).clamp(0.0, 1.0);
            result.rerank_score = Some(self.blend(ce, result.final_score()));
        }

        results.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    fn blend(&self, cross_encoder: f64, fused: f64) -> f64 {
        self.weight * cross_encoder + (1.0 - self.weight) * fused
    }
}
