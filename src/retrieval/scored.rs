//! Scored results and the search response envelope

use crate::corpus::Fields;
use serde::{Deserialize, Serialize};

/// Coarse trust bucket derived from the fused score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// `> 0.7` high, `> 0.5` medium, anything else low
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Confidence::High
        } else if score > 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signal scores, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub keyword: f64,
    pub domain: f64,
    #[serde(rename = "final")]
    pub final_score: f64,
}

/// A ranked candidate with its score breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    /// Document id
    pub id: String,

    /// Document fields as returned by the vector store
    pub fields: Fields,

    /// Distance reported by the vector store (lower is closer)
    pub raw_distance: f32,

    pub score_breakdown: ScoreBreakdown,

    pub confidence: Confidence,

    /// Cross-encoder blended score, present only when reranking ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
}

impl ScoredResult {
    pub fn final_score(&self) -> f64 {
        self.score_breakdown.final_score
    }

    /// Field value, or empty string when absent
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Outcome of one search request
///
/// Failures are reported in-band (`success = false`) so callers on a live
/// request path always receive a well-formed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub results: Vec<ScoredResult>,

    /// Results returned after filtering and truncation
    pub total_found: usize,

    /// Candidates scored before filtering
    pub total_searched: usize,

    #[serde(default)]
    pub reranking_used: bool,

    /// More than one phrasing of the query was searched
    #[serde(default)]
    pub query_expansion_used: bool,

    #[serde(default)]
    pub from_cache: bool,
}

impl SearchResponse {
    pub fn found(results: Vec<ScoredResult>, total_searched: usize, reranking_used: bool) -> Self {
        Self {
            success: true,
            message: None,
            total_found: results.len(),
            results,
            total_searched,
            reranking_used,
            query_expansion_used: false,
            from_cache: false,
        }
    }

    /// Successful response with no results and an explanation
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::found(Vec::new(), 0, false)
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::empty(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(Confidence::from_score(0.71), Confidence::High);
        assert_eq!(Confidence::from_score(0.7), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.51), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.5), Confidence::Low);
        assert_eq!(Confidence::from_score(0.0), Confidence::Low);
    }

    #[test]
    fn test_breakdown_serializes_final() {
        let breakdown = ScoreBreakdown {
            semantic: 1.0,
            keyword: 0.0,
            domain: 0.0,
            final_score: 0.5,
        };
        let json = serde_json::to_value(breakdown).unwrap();
        assert_eq!(json["final"], 0.5);
        assert_eq!(
            serde_json::to_value(Confidence::Medium).unwrap(),
            serde_json::json!("medium")
        );
    }

    #[test]
    fn test_response_constructors() {
        let failed = SearchResponse::failure("No data in database");
        assert!(!failed.success);
        assert!(failed.results.is_empty());
        assert_eq!(failed.message.as_deref(), Some("No data in database"));

        let empty = SearchResponse::empty("Query is empty");
        assert!(empty.success);
        assert_eq!(empty.total_found, 0);
    }
}
