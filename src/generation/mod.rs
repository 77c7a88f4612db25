//! Response composition contract
//!
//! Turning ranked documents into an answer happens outside this crate. The
//! searcher only caches what a [`ResponseGenerator`] returns.

use crate::corpus::Fields;
use crate::retrieval::{Confidence, ScoredResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Response generation failed: {0}")]
    GenerationFailed(String),
}

/// Caller-supplied request context
///
/// Requests tied to a conversation depend on its history. They bypass the
/// caches, and the generator may personalize them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub conversation_id: Option<String>,
    pub user_name: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            user_name: None,
        }
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn bypasses_cache(&self) -> bool {
        self.conversation_id.is_some()
    }
}

/// Answer composed from ranked documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub answer: String,

    pub confidence: Confidence,

    /// Ids of the documents the answer draws on
    pub sources: Vec<String>,

    #[serde(default)]
    pub from_cache: bool,
}

impl GeneratedResponse {
    pub fn new(answer: impl Into<String>, confidence: Confidence, sources: Vec<String>) -> Self {
        Self {
            answer: answer.into(),
            confidence,
            sources,
            from_cache: false,
        }
    }

    pub fn has_answer(&self) -> bool {
        !self.answer.trim().is_empty()
    }
}

/// Composes an answer from a query, its ranked results and extracted features
///
/// `context` carries the conversation and user the request belongs to.
/// Anonymous contexts must produce answers that are safe to share, since
/// they are cached by query.
pub trait ResponseGenerator: Send + Sync {
    fn generate(
        &self,
        query: &str,
        results: &[ScoredResult],
        features: &Fields,
        context: &RequestContext,
    ) -> Result<GeneratedResponse, GenerationError>;
}
