//! Score fusion: semantic distance, keyword overlap and domain heuristics
//!
//! Every candidate gets three sub-scores in `[0, 1]`:
//! - semantic: `1 / (1 + distance / scale)`
//! - keyword: Jaccard overlap between query and document keywords
//! - domain: fixed bonus per matched category, capped
//!
//! fused as `0.5 * semantic + 0.3 * keyword + 0.2 * domain`.

use crate::config::{DomainCategory, RetrievalConfig};
use crate::corpus::Fields;
use crate::embedding::{Tokenizer, VectorHit};
use crate::retrieval::{Confidence, ScoreBreakdown, ScoredResult};
use ahash::AHashSet;
use thiserror::Error;

pub const SEMANTIC_WEIGHT: f64 = 0.5;
pub const KEYWORD_WEIGHT: f64 = 0.3;
pub const DOMAIN_WEIGHT: f64 = 0.2;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Semantic scale must be positive, got {0}")]
    InvalidScale(f64),

    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

/// Configuration for score fusion
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub semantic_scale: f64,
    pub confidence_threshold: f64,
    pub keyword_min_chars: usize,
    pub searchable_fields: Vec<String>,
    pub domain_increment: f64,
    pub domain_cap: f64,
    pub domain_min_field_chars: usize,
    pub domain_categories: Vec<DomainCategory>,
}

impl FusionConfig {
    pub fn from_retrieval(config: &RetrievalConfig) -> Result<Self, FusionError> {
        if !(config.semantic_scale > 0.0 && config.semantic_scale.is_finite()) {
            return Err(FusionError::InvalidScale(config.semantic_scale));
        }
        for (name, value) in [
            ("confidence_threshold", config.confidence_threshold),
            ("domain_increment", config.domain_increment),
            ("domain_cap", config.domain_cap),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FusionError::OutOfRange { name, value });
            }
        }

        Ok(Self::build(config))
    }

    fn build(config: &RetrievalConfig) -> Self {
        Self {
            semantic_scale: config.semantic_scale,
            confidence_threshold: config.confidence_threshold,
            keyword_min_chars: config.keyword_min_chars,
            searchable_fields: config.searchable_fields.clone(),
            domain_increment: config.domain_increment,
            domain_cap: config.domain_cap,
            domain_min_field_chars: config.domain_min_field_chars,
            domain_categories: config
                .domain_categories
                .iter()
                .map(|c| DomainCategory {
                    name: c.name.clone(),
                    field: c.field.clone(),
                    triggers: c.triggers.iter().map(|t| t.to_lowercase()).collect(),
                })
                .collect(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::build(&RetrievalConfig::default())
    }
}

/// Map an unbounded distance (lower is closer) to a similarity in `(0, 1]`
pub fn semantic_similarity(distance: f64, scale: f64) -> f64 {
    if distance.is_nan() || distance == f64::INFINITY {
        return 0.0;
    }
    if distance <= 0.0 {
        return 1.0;
    }
    1.0 / (1.0 + distance / scale)
}

/// `|A ∩ B| / |A ∪ B|`, 0 when either side is empty
pub fn jaccard(a: &AHashSet<String>, b: &AHashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

pub fn fuse(semantic: f64, keyword: f64, domain: f64) -> f64 {
    (SEMANTIC_WEIGHT * semantic + KEYWORD_WEIGHT * keyword + DOMAIN_WEIGHT * domain)
        .clamp(0.0, 1.0)
}

/// Scores raw vector-store candidates against a query
///
/// Pure: the result depends only on the query, the candidates and the
/// configuration.
#[derive(Debug, Clone)]
pub struct ScoreFusion {
    config: FusionConfig,
    tokenizer: Tokenizer,
}

/// Query-side data computed once per request
struct PreparedQuery {
    lowered: String,
    keywords: AHashSet<String>,
}

impl ScoreFusion {
    pub fn new(config: FusionConfig, tokenizer: Tokenizer) -> Self {
        Self { config, tokenizer }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    fn prepare(&self, query: &str) -> PreparedQuery {
        PreparedQuery {
            lowered: query.to_lowercase(),
            keywords: self.tokenizer.keywords(query, self.config.keyword_min_chars),
        }
    }

    /// Keyword overlap between the query and the candidate's searchable fields
    pub fn keyword_score(&self, query: &str, fields: &Fields) -> f64 {
        self.keyword_score_prepared(&self.prepare(query), fields)
    }

    fn keyword_score_prepared(&self, query: &PreparedQuery, fields: &Fields) -> f64 {
        let searchable = self
            .config
            .searchable_fields
            .iter()
            .map(|name| fields.get(name).map(String::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ");
        let doc_keywords = self
            .tokenizer
            .keywords(&searchable, self.config.keyword_min_chars);
        jaccard(&query.keywords, &doc_keywords)
    }

    /// Domain bonus for categories triggered by the query and backed by content
    pub fn domain_score(&self, query: &str, fields: &Fields) -> f64 {
        self.domain_score_prepared(&self.prepare(query), fields)
    }

    fn domain_score_prepared(&self, query: &PreparedQuery, fields: &Fields) -> f64 {
        let matched = self
            .config
            .domain_categories
            .iter()
            .filter(|category| {
                category
                    .triggers
                    .iter()
                    .any(|trigger| query.lowered.contains(trigger.as_str()))
            })
            .filter(|category| {
                fields
                    .get(&category.field)
                    .is_some_and(|value| value.chars().count() > self.config.domain_min_field_chars)
            })
            .count();

        (matched as f64 * self.config.domain_increment).min(self.config.domain_cap)
    }

    pub fn breakdown(&self, query: &str, distance: f32, fields: &Fields) -> ScoreBreakdown {
        self.breakdown_prepared(&self.prepare(query), distance, fields)
    }

    fn breakdown_prepared(
        &self,
        query: &PreparedQuery,
        distance: f32,
        fields: &Fields,
    ) -> ScoreBreakdown {
        let semantic = semantic_similarity(f64::from(distance), self.config.semantic_scale);
        let keyword = self.keyword_score_prepared(query, fields);
        let domain = self.domain_score_prepared(query, fields);

        ScoreBreakdown {
            semantic,
            keyword,
            domain,
            final_score: fuse(semantic, keyword, domain),
        }
    }

    /// Score every candidate and sort best first
    ///
    /// Equal scores keep the vector store's order.
    pub fn score_all(&self, query: &str, hits: Vec<VectorHit>) -> Vec<ScoredResult> {
        let prepared = self.prepare(query);

        let mut scored: Vec<ScoredResult> = hits
            .into_iter()
            .map(|hit| {
                let breakdown = self.breakdown_prepared(&prepared, hit.distance, &hit.metadata);
                ScoredResult {
                    id: hit.id,
                    fields: hit.metadata,
                    raw_distance: hit.distance,
                    confidence: Confidence::from_score(breakdown.final_score),
                    score_breakdown: breakdown,
                    rerank_score: None,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.final_score()
                .partial_cmp(&a.final_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }

    /// Drop results under the confidence threshold, then keep the first `top_k`
    pub fn select(&self, mut results: Vec<ScoredResult>, top_k: usize) -> Vec<ScoredResult> {
        results.retain(|r| r.final_score() >= self.config.confidence_threshold);
        results.truncate(top_k);
        results
    }

    /// Full ranking: score, sort, filter and truncate
    pub fn rank(&self, query: &str, hits: Vec<VectorHit>, top_k: usize) -> Vec<ScoredResult> {
        let scored = self.score_all(query, hits);
        self.select(scored, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn hit(id: &str, distance: f32, pairs: &[(&str, &str)]) -> VectorHit {
        VectorHit {
            id: id.to_string(),
            metadata: fields(pairs),
            distance,
        }
    }

    fn fusion() -> ScoreFusion {
        ScoreFusion::new(FusionConfig::default(), Tokenizer::new())
    }

    #[test]
    fn test_semantic_similarity_transform() {
        assert_eq!(semantic_similarity(0.0, 10.0), 1.0);
        assert_eq!(semantic_similarity(-1.0, 10.0), 1.0);
        assert!((semantic_similarity(10.0, 10.0) - 0.5).abs() < 1e-12);
        assert!(semantic_similarity(5.0, 10.0) > semantic_similarity(6.0, 10.0));
        assert_eq!(semantic_similarity(f64::INFINITY, 10.0), 0.0);
        assert_eq!(semantic_similarity(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn test_scale_changes_similarity() {
        assert!(semantic_similarity(10.0, 100.0) > semantic_similarity(10.0, 10.0));
    }

    #[test]
    fn test_jaccard() {
        let a: AHashSet<String> = ["sốt", "đau", "đầu"].iter().map(|s| s.to_string()).collect();
        let b: AHashSet<String> = ["sốt", "ho"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 0.25).abs() < 1e-12);
        assert_eq!(jaccard(&a, &AHashSet::new()), 0.0);
    }

    #[test]
    fn test_keyword_score_uses_searchable_fields_only() {
        let scorer = fusion();
        let matching = fields(&[("symptoms", "sốt cao")]);
        let elsewhere = fields(&[("notes", "sốt cao")]);

        assert!(scorer.keyword_score("sốt cao", &matching) > 0.99);
        assert_eq!(scorer.keyword_score("sốt cao", &elsewhere), 0.0);
        assert_eq!(scorer.keyword_score("?!", &matching), 0.0);
    }

    #[test]
    fn test_domain_score_requires_trigger_and_content() {
        let scorer = fusion();
        let rich = fields(&[
            ("symptoms", "sốt, đau đầu"),
            ("treatment", "nghỉ ngơi, uống nhiều nước"),
        ]);

        assert!((scorer.domain_score("bị sốt", &rich) - 0.15).abs() < 1e-12);
        assert!((scorer.domain_score("sốt thì uống thuốc gì", &rich) - 0.30).abs() < 1e-12);
        assert_eq!(scorer.domain_score("bệnh gì", &rich), 0.0);

        let short = fields(&[("symptoms", "sốt")]);
        assert_eq!(scorer.domain_score("sốt", &short), 0.0);
    }

    #[test]
    fn test_domain_score_is_capped() {
        let mut config = FusionConfig::default();
        config.domain_increment = 0.5;
        let scorer = ScoreFusion::new(config, Tokenizer::new());
        let rich = fields(&[
            ("symptoms", "sốt, đau đầu"),
            ("treatment", "nghỉ ngơi, uống nhiều nước"),
        ]);

        assert_eq!(scorer.domain_score("sốt uống thuốc", &rich), 0.6);
    }

    #[test]
    fn test_breakdown_formula_and_bounds() {
        let scorer = fusion();
        let candidate = fields(&[("symptoms", "sốt, đau đầu"), ("disease_name", "Cúm")]);

        for distance in [0.0_f32, 0.5, 3.0, 10.0, 250.0] {
            let b = scorer.breakdown("sốt đau đầu", distance, &candidate);
            let expected = 0.5 * b.semantic + 0.3 * b.keyword + 0.2 * b.domain;
            assert!((b.final_score - expected).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&b.final_score));
            assert!(b.domain <= 0.6);
        }
    }

    #[test]
    fn test_confidence_matches_final_score() {
        let scorer = fusion();
        let hits = vec![
            hit("near", 0.0, &[("symptoms", "sốt, đau đầu")]),
            hit("mid", 8.0, &[]),
            hit("far", 200.0, &[]),
        ];

        for result in scorer.score_all("sốt", hits) {
            assert_eq!(result.confidence, Confidence::from_score(result.final_score()));
        }
    }

    #[test]
    fn test_domain_signal_breaks_semantic_tie() {
        let mut config = FusionConfig::default();
        config.domain_categories = vec![DomainCategory::new("symptom", "symptom", &["sốt"])];
        let scorer = ScoreFusion::new(config, Tokenizer::new());

        let hits = vec![
            hit("D2", 4.0, &[("symptom", "")]),
            hit("D1", 4.0, &[("symptom", "sốt, đau đầu")]),
        ];
        let ranked = scorer.score_all("sốt", hits);

        assert_eq!(ranked[0].id, "D1");
        assert!(ranked[0].score_breakdown.domain > ranked[1].score_breakdown.domain);
        assert!(ranked[0].final_score() > ranked[1].final_score());
    }

    #[test]
    fn test_threshold_drops_weak_candidates() {
        let scorer = fusion();
        // semantic = 0.2 -> final = 0.1
        let hits = vec![hit("weak", 40.0, &[]), hit("strong", 1.0, &[])];
        let ranked = scorer.rank("xyz", hits, 10);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "strong");
    }

    #[test]
    fn test_rank_truncates_and_keeps_tie_order() {
        let scorer = fusion();
        let hits = vec![
            hit("a", 2.0, &[]),
            hit("b", 2.0, &[]),
            hit("c", 1.0, &[]),
            hit("d", 2.0, &[]),
        ];
        let ids: Vec<String> = scorer
            .rank("xyz", hits, 3)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut retrieval = RetrievalConfig::default();
        retrieval.semantic_scale = -1.0;
        assert!(matches!(
            FusionConfig::from_retrieval(&retrieval),
            Err(FusionError::InvalidScale(_))
        ));

        let mut retrieval = RetrievalConfig::default();
        retrieval.domain_cap = 2.0;
        assert!(matches!(
            FusionConfig::from_retrieval(&retrieval),
            Err(FusionError::OutOfRange { name: "domain_cap", .. })
        ));
    }
}
