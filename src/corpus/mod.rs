//! Corpus documents and loading
//!
//! A corpus is a JSON array of records with an `id`, optional `text` and a
//! map of named `fields`. Records without text get a searchable body built
//! from their fields.

use crate::error::{MedisearchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Named document attributes (symptoms, treatment, prevention, ...)
pub type Fields = BTreeMap<String, String>;

/// Fields joined into the searchable body when a record carries no text
pub const SEARCHABLE_TEXT_FIELDS: &[&str] = &[
    "disease_name",
    "symptoms",
    "treatment",
    "prevention",
    "description",
    "question",
    "answer",
];

/// An indexed reference document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique, stable identifier
    pub id: String,

    /// Searchable body
    pub text: String,

    /// Named attributes used for domain scoring
    #[serde(default)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            fields,
        }
    }

    /// Build a document whose text is the concatenation of its known fields
    pub fn from_fields(id: impl Into<String>, fields: Fields) -> Self {
        let text = searchable_text(&fields);
        Self::new(id, text, fields)
    }

    /// Field value, or empty string when absent
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Join the standard fields into one searchable string
pub fn searchable_text(fields: &Fields) -> String {
    SEARCHABLE_TEXT_FIELDS
        .iter()
        .map(|name| fields.get(*name).map(String::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct CorpusRecord {
    id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    fields: Fields,
}

/// Parse a corpus from a JSON string
pub fn parse_corpus(json: &str) -> Result<Vec<Document>> {
    let records: Vec<CorpusRecord> = serde_json::from_str(json).map_err(|e| MedisearchError::Json {
        source: e,
        context: "Failed to parse corpus".to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(records.len());

    for record in records {
        if record.id.trim().is_empty() {
            return Err(MedisearchError::Corpus(
                "Document id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(record.id.clone()) {
            return Err(MedisearchError::Corpus(format!(
                "Duplicate document id: {}",
                record.id
            )));
        }

        let document = match record.text {
            Some(text) if !text.trim().is_empty() => Document::new(record.id, text, record.fields),
            _ => Document::from_fields(record.id, record.fields),
        };
        documents.push(document);
    }

    Ok(documents)
}

/// Load a corpus from a JSON file
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path).map_err(|e| MedisearchError::Io {
        source: e,
        context: format!("Failed to read corpus file: {}", path.display()),
    })?;

    let documents = parse_corpus(&content)?;
    tracing::info!(
        "Loaded {} documents from {}",
        documents.len(),
        path.display()
    );
    Ok(documents)
}
