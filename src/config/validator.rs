use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::SUPPORTED_MODELS;
use crate::error::{MedisearchError, Result, ValidationError};
use crate::retrieval::SUPPORTED_RERANKERS;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_keyword(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_reranking(config, &mut errors);
        Self::validate_expansion(config, &mut errors);
        Self::validate_cache(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MedisearchError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let model = config.embedding.model.to_lowercase();
        if !SUPPORTED_MODELS.contains(&model.as_str()) {
            errors.push(ValidationError::new(
                "embedding.model",
                format!(
                    "Model must be one of {:?}, got '{}'",
                    SUPPORTED_MODELS, config.embedding.model
                ),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        let indexing = &config.indexing;
        for (path, value) in [
            ("indexing.hnsw_m", indexing.hnsw_m),
            ("indexing.hnsw_capacity", indexing.hnsw_capacity),
            ("indexing.hnsw_ef_construction", indexing.hnsw_ef_construction),
            ("indexing.hnsw_ef_search", indexing.hnsw_ef_search),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(path, "Must be greater than 0"));
            }
        }
    }

    fn validate_keyword(config: &Config, errors: &mut Vec<ValidationError>) {
        if !(config.keyword.bm25_k1 >= 0.0) {
            errors.push(ValidationError::new(
                "keyword.bm25_k1",
                format!("k1 must be non-negative, got {}", config.keyword.bm25_k1),
            ));
        }

        if !(0.0..=1.0).contains(&config.keyword.bm25_b) {
            errors.push(ValidationError::new(
                "keyword.bm25_b",
                format!("b must be between 0.0 and 1.0, got {}", config.keyword.bm25_b),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if !(retrieval.semantic_scale > 0.0 && retrieval.semantic_scale.is_finite()) {
            errors.push(ValidationError::new(
                "retrieval.semantic_scale",
                format!(
                    "Scale must be a positive number, got {}",
                    retrieval.semantic_scale
                ),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.confidence_threshold) {
            errors.push(ValidationError::new(
                "retrieval.confidence_threshold",
                format!(
                    "Threshold must be between 0.0 and 1.0, got {}",
                    retrieval.confidence_threshold
                ),
            ));
        }

        if retrieval.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_multiplier",
                "Candidate multiplier must be greater than 0",
            ));
        }

        if retrieval.searchable_fields.is_empty() {
            errors.push(ValidationError::new(
                "retrieval.searchable_fields",
                "At least one searchable field is required",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.domain_increment) {
            errors.push(ValidationError::new(
                "retrieval.domain_increment",
                format!(
                    "Increment must be between 0.0 and 1.0, got {}",
                    retrieval.domain_increment
                ),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.domain_cap) {
            errors.push(ValidationError::new(
                "retrieval.domain_cap",
                format!(
                    "Cap must be between 0.0 and 1.0, got {}",
                    retrieval.domain_cap
                ),
            ));
        }

        for (i, category) in retrieval.domain_categories.iter().enumerate() {
            if category.field.is_empty() {
                errors.push(ValidationError::new(
                    format!("retrieval.domain_categories[{}].field", i),
                    "Target field cannot be empty",
                ));
            }
            if category.triggers.iter().any(|t| t.trim().is_empty()) {
                errors.push(ValidationError::new(
                    format!("retrieval.domain_categories[{}].triggers", i),
                    "Trigger terms cannot be empty",
                ));
            }
        }
    }

    fn validate_reranking(config: &Config, errors: &mut Vec<ValidationError>) {
        let reranking = &config.reranking;

        if !(0.0..=1.0).contains(&reranking.cross_encoder_weight) {
            errors.push(ValidationError::new(
                "reranking.cross_encoder_weight",
                format!(
                    "Weight must be between 0.0 and 1.0, got {}",
                    reranking.cross_encoder_weight
                ),
            ));
        }

        if reranking.enabled && !SUPPORTED_RERANKERS.contains(&reranking.model.as_str()) {
            errors.push(ValidationError::new(
                "reranking.model",
                format!(
                    "Model must be one of {:?}, got '{}'",
                    SUPPORTED_RERANKERS, reranking.model
                ),
            ));
        }
    }

    fn validate_expansion(config: &Config, errors: &mut Vec<ValidationError>) {
        let expansion = &config.expansion;

        if expansion.max_alternatives > 5 {
            errors.push(ValidationError::new(
                "expansion.max_alternatives",
                format!(
                    "At most 5 alternative queries are allowed, got {}",
                    expansion.max_alternatives
                ),
            ));
        }

        for (phrase, alternatives) in &expansion.synonyms {
            if phrase.trim().is_empty() || alternatives.iter().any(|a| a.trim().is_empty()) {
                errors.push(ValidationError::new(
                    "expansion.synonyms",
                    format!("Empty phrase in synonym entry '{}'", phrase),
                ));
            }
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.max_size == 0 {
            errors.push(ValidationError::new(
                "cache.max_size",
                "Cache size must be greater than 0",
            ));
        }

        // Shorter bounds could not hold "prefix:" plus a digest
        if config.cache.max_key_chars < 16 {
            errors.push(ValidationError::new(
                "cache.max_key_chars",
                format!(
                    "Key length bound must be at least 16, got {}",
                    config.cache.max_key_chars
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(MedisearchError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_non_positive_scale() {
        let mut config = Config::default();
        config.retrieval.semantic_scale = 0.0;
        assert_eq!(field_errors(&config), vec!["retrieval.semantic_scale"]);

        config.retrieval.semantic_scale = f64::NAN;
        assert_eq!(field_errors(&config), vec!["retrieval.semantic_scale"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.cache.max_size = 0;
        config.retrieval.confidence_threshold = 1.5;
        config.embedding.model = "unknown".to_string();

        let errors = field_errors(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&"cache.max_size".to_string()));
        assert!(errors.contains(&"retrieval.confidence_threshold".to_string()));
        assert!(errors.contains(&"embedding.model".to_string()));
    }

    #[test]
    fn test_expansion_bounds() {
        let mut config = Config::default();
        config.expansion.max_alternatives = 9;
        config
            .expansion
            .synonyms
            .insert("ho".to_string(), vec![" ".to_string()]);

        assert_eq!(
            field_errors(&config),
            vec!["expansion.max_alternatives", "expansion.synonyms"]
        );
    }

    #[test]
    fn test_reranker_model_checked_only_when_enabled() {
        let mut config = Config::default();
        config.reranking.model = "unknown".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.reranking.enabled = true;
        assert_eq!(field_errors(&config), vec!["reranking.model"]);
    }

    #[test]
    fn test_empty_trigger_rejected() {
        let mut config = Config::default();
        config.retrieval.domain_categories[0].triggers.push(" ".to_string());
        assert_eq!(
            field_errors(&config),
            vec!["retrieval.domain_categories[0].triggers"]
        );
    }
}
