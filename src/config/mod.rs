//! Configuration management for Medisearch
//!
//! Loads the TOML config file, applies `MEDISEARCH_SECTION__KEY` environment
//! overrides and validates the result. Every section has defaults, so a
//! partial file (or no file at all) is valid.

use crate::error::{MedisearchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub keyword: KeywordConfig,
    pub retrieval: RetrievalConfig,
    pub reranking: RerankingConfig,
    pub expansion: ExpansionConfig,
    pub cache: CacheConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: current_timestamp(),
            last_modified: current_timestamp(),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "multilingual-e5-small".to_string(),
            batch_size: 32,
        }
    }
}

/// HNSW vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub hnsw_m: usize,
    pub hnsw_capacity: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            hnsw_m: 16,
            hnsw_capacity: 10_000,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

/// BM25 keyword index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub bm25_k1: f64,
    pub bm25_b: f64,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            bm25_k1: 1.5,
            bm25_b: 0.75,
        }
    }
}

/// A group of query trigger terms tied to one document field
///
/// When any trigger occurs in the query and the document's `field` has
/// substantial content, the document earns a domain bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCategory {
    pub name: String,
    pub field: String,
    pub triggers: Vec<String>,
}

impl DomainCategory {
    pub fn new(name: &str, field: &str, triggers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        }
    }
}

fn default_domain_categories() -> Vec<DomainCategory> {
    vec![
        DomainCategory::new(
            "symptoms",
            "symptoms",
            &[
                "triệu chứng",
                "dấu hiệu",
                "biểu hiện",
                "sốt",
                "ho",
                "đau",
                "ngứa",
                "mệt",
                "buồn nôn",
            ],
        ),
        DomainCategory::new(
            "treatment",
            "treatment",
            &["điều trị", "chữa", "thuốc", "uống", "dùng", "khám", "bác sĩ"],
        ),
        DomainCategory::new(
            "prevention",
            "prevention",
            &["phòng ngừa", "tránh", "vệ sinh", "vắc-xin", "tiêm chủng"],
        ),
        DomainCategory::new(
            "diagnosis",
            "diagnosis",
            &["chẩn đoán", "xét nghiệm", "kiểm tra", "khám"],
        ),
    ]
}

/// Candidate retrieval and score fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Distance at which semantic similarity drops to 0.5. Depends on the
    /// embedding space and has to be calibrated per model.
    pub semantic_scale: f64,
    /// Results with a fused score below this are dropped
    pub confidence_threshold: f64,
    /// Candidates requested from the vector store per requested result
    pub candidate_multiplier: usize,
    /// Shortest token counted for keyword overlap
    pub keyword_min_chars: usize,
    /// Fields whose text is compared with the query for keyword overlap
    pub searchable_fields: Vec<String>,
    pub domain_increment: f64,
    pub domain_cap: f64,
    /// A target field must be longer than this to earn the domain bonus
    pub domain_min_field_chars: usize,
    pub domain_categories: Vec<DomainCategory>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_scale: 10.0,
            confidence_threshold: 0.15,
            candidate_multiplier: 2,
            keyword_min_chars: 3,
            searchable_fields: [
                "disease_name",
                "symptoms",
                "treatment",
                "prevention",
                "description",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
            domain_increment: 0.15,
            domain_cap: 0.6,
            domain_min_field_chars: 5,
            domain_categories: default_domain_categories(),
        }
    }
}

/// Cross-encoder reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankingConfig {
    pub enabled: bool,
    pub model: String,
    /// Share of the cross-encoder score in the blended rerank score
    pub cross_encoder_weight: f64,
}

impl Default for RerankingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "bge-reranker-v2-m3".to_string(),
            cross_encoder_weight: 0.7,
        }
    }
}

/// Query expansion configuration
///
/// Each synonym entry maps a phrase to alternative phrasings. A query
/// containing the phrase is also searched with each alternative in its place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub enabled: bool,
    /// Alternative queries searched in addition to the original
    pub max_alternatives: usize,
    pub synonyms: BTreeMap<String, Vec<String>>,
}

fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    [
        ("sốt cao", &["nhiệt độ cao", "sốt nóng"][..]),
        ("đau bụng", &["đau dạ dày", "đau vùng bụng"][..]),
        ("tiểu đường", &["đái tháo đường", "đường huyết cao"][..]),
        ("cảm cúm", &["cúm", "cảm lạnh"][..]),
        ("huyết áp cao", &["tăng huyết áp"][..]),
    ]
    .iter()
    .map(|(phrase, alternatives)| {
        (
            phrase.to_string(),
            alternatives.iter().map(|a| a.to_string()).collect(),
        )
    })
    .collect()
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_alternatives: 2,
            synonyms: default_synonyms(),
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    /// Seconds a search result stays valid (0 = no expiry)
    pub ttl_search_secs: u64,
    /// Seconds a generated response stays valid (0 = no expiry)
    pub ttl_response_secs: u64,
    pub max_key_chars: usize,
}

impl CacheConfig {
    pub fn ttl_search(&self) -> Duration {
        Duration::from_secs(self.ttl_search_secs)
    }

    pub fn ttl_response(&self) -> Duration {
        Duration::from_secs(self.ttl_response_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            ttl_search_secs: 3600,
            ttl_response_secs: 1800,
            max_key_chars: crate::cache::DEFAULT_MAX_KEY_CHARS,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MedisearchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MedisearchError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load the file at `path` if given, else the default location; fall back
    /// to built-in defaults when no file exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if path.exists() {
            return Self::load(&path);
        }

        tracing::warn!(
            "Config file not found at {}, using defaults. Run 'medisearch config init' to create one.",
            path.display()
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MedisearchError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: MEDISEARCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("MEDISEARCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CACHE__ENABLED" => self.cache.enabled = parse_env(path, value)?,
            "CACHE__MAX_SIZE" => self.cache.max_size = parse_env(path, value)?,
            "CACHE__TTL_SEARCH_SECS" => self.cache.ttl_search_secs = parse_env(path, value)?,
            "CACHE__TTL_RESPONSE_SECS" => self.cache.ttl_response_secs = parse_env(path, value)?,
            "RETRIEVAL__CONFIDENCE_THRESHOLD" => {
                self.retrieval.confidence_threshold = parse_env(path, value)?
            }
            "RETRIEVAL__SEMANTIC_SCALE" => self.retrieval.semantic_scale = parse_env(path, value)?,
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "RERANKING__ENABLED" => self.reranking.enabled = parse_env(path, value)?,
            "RERANKING__MODEL" => self.reranking.model = value.to_string(),
            "EXPANSION__ENABLED" => self.expansion.enabled = parse_env(path, value)?,
            "EXPANSION__MAX_ALTERNATIVES" => {
                self.expansion.max_alternatives = parse_env(path, value)?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            MedisearchError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("medisearch").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MedisearchError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}
