//! Medisearch - Hybrid retrieval and ranking for medical reference documents
//!
//! Ranks documents for a question by fusing vector similarity, keyword overlap and
//! domain heuristics, with a thread-safe LRU+TTL cache in front of retrieval and
//! response composition.

pub mod cache;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod retrieval;

pub use error::{MedisearchError, Result};
