//! Cache key normalization
//!
//! Equivalent phrasings of a query ("Sốt?", "SỐT", "sốt!!!") must map to the
//! same key, and pathological inputs must not produce unbounded keys.

use regex::Regex;
use std::sync::OnceLock;

/// Keys longer than this many characters are replaced by a digest
pub const DEFAULT_MAX_KEY_CHARS: usize = 200;

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"))
}

/// Lowercase, drop punctuation, collapse whitespace and join words with `_`
///
/// "Triệu chứng sốt?" -> "triệu_chứng_sốt"
pub fn normalize_query(query: &str) -> String {
    let lowered = query.trim().to_lowercase();
    let stripped = punctuation().replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Build a cache key from an operation prefix, the query and extra parameters
///
/// Parameters are sorted by name so argument order never changes the key.
pub fn cache_key(prefix: &str, query: &str, params: &[(&str, String)]) -> String {
    cache_key_bounded(prefix, query, params, DEFAULT_MAX_KEY_CHARS)
}

/// Same as [`cache_key`] with an explicit length bound
pub fn cache_key_bounded(
    prefix: &str,
    query: &str,
    params: &[(&str, String)],
    max_chars: usize,
) -> String {
    let normalized = normalize_query(query);

    let key = if params.is_empty() {
        format!("{}:{}", prefix, normalized)
    } else {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("_");
        format!("{}:{}:{}", prefix, normalized, joined)
    };

    if key.chars().count() > max_chars {
        let digest = blake3::hash(key.as_bytes());
        format!("{}:{}", prefix, digest.to_hex())
    } else {
        key
    }
}
