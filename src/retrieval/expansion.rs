//! Query expansion
//!
//! Alternative phrasings of a question widen the candidate pool. Candidates
//! found through any phrasing are still scored against the original question.

use crate::config::ExpansionConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("Query expansion failed: {0}")]
    ExpansionFailed(String),
}

/// Produces alternative phrasings of a query
///
/// The returned list excludes the original query. The searcher deduplicates
/// and bounds it, so implementations may return more than will be used.
pub trait QueryExpander: Send + Sync {
    fn expand(&self, query: &str) -> Result<Vec<String>, ExpansionError>;

    fn name(&self) -> &str;
}

/// Expands queries from a phrase table
///
/// Every phrase found in the lowercased query yields one alternative per
/// synonym, with the phrase replaced. Longer phrases are tried first.
pub struct SynonymExpander {
    entries: Vec<(String, Vec<String>)>,
}

impl SynonymExpander {
    pub fn new(config: &ExpansionConfig) -> Self {
        let mut entries: Vec<(String, Vec<String>)> = config
            .synonyms
            .iter()
            .map(|(phrase, alternatives)| {
                (
                    phrase.trim().to_lowercase(),
                    alternatives.iter().map(|a| a.trim().to_lowercase()).collect(),
                )
            })
            .filter(|(phrase, _)| !phrase.is_empty())
            .collect();

        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        Self { entries }
    }
}

impl QueryExpander for SynonymExpander {
    fn expand(&self, query: &str) -> Result<Vec<String>, ExpansionError> {
        let lowered = query.to_lowercase();

        Ok(self
            .entries
            .iter()
            .filter(|(phrase, _)| lowered.contains(phrase.as_str()))
            .flat_map(|(phrase, alternatives)| {
                alternatives
                    .iter()
                    .filter(|a| !a.is_empty())
                    .map(|alternative| lowered.replace(phrase.as_str(), alternative))
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    fn name(&self) -> &str {
        "synonyms"
    }
}

/// Original query first, then up to `max_alternatives` distinct alternatives
///
/// A failing expander leaves only the original query.
pub fn expanded_queries(
    expander: Option<&dyn QueryExpander>,
    query: &str,
    max_alternatives: usize,
) -> Vec<String> {
    let mut queries = vec![query.to_string()];

    let Some(expander) = expander else {
        return queries;
    };

    match expander.expand(query) {
        Ok(alternatives) => {
            let original = query.trim().to_lowercase();
            for alternative in alternatives {
                if queries.len() > max_alternatives {
                    break;
                }
                let trimmed = alternative.trim();
                if trimmed.is_empty() || trimmed.to_lowercase() == original {
                    continue;
                }
                if queries.iter().any(|q| q == trimmed) {
                    continue;
                }
                queries.push(trimmed.to_string());
            }
            tracing::debug!("Query expansion: {} -> {} queries", query, queries.len());
        }
        Err(e) => {
            tracing::warn!(
                "Query expansion with {} failed: {}. Using original query only.",
                expander.name(),
                e
            );
        }
    }

    queries
}
