//! Tokenizer shared by the keyword index and keyword-overlap scoring

use ahash::AHashSet;
use regex::Regex;

/// Vietnamese function words that carry no retrieval signal
pub const STOP_WORDS: &[&str] = &[
    "là", "của", "và", "có", "được", "này", "đó", "các", "cho", "từ", "với", "một", "những",
    "trong", "để", "khi", "bị", "bởi", "về", "theo", "như", "đã", "sẽ", "thì", "hoặc", "nhưng",
    "mà",
];

/// Lowercasing, punctuation-stripping word tokenizer
///
/// Letters with diacritics survive punctuation stripping, so Vietnamese
/// words such as "sốt" or "đau" are kept intact.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    punctuation: Regex,
    stop_words: AHashSet<&'static str>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            // Unicode-aware: \w covers letters, marks and digits in every script
            punctuation: Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Split text into ordered tokens
    ///
    /// Stop words and single-character tokens are dropped.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned = self.punctuation.replace_all(&lowered, " ");

        cleaned
            .split_whitespace()
            .filter(|word| !self.stop_words.contains(word))
            .filter(|word| word.chars().count() > 1)
            .map(str::to_string)
            .collect()
    }

    /// Distinct tokens with at least `min_chars` characters
    pub fn keywords(&self, text: &str, min_chars: usize) -> AHashSet<String> {
        self.tokenize(text)
            .into_iter()
            .filter(|token| token.chars().count() >= min_chars)
            .collect()
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
