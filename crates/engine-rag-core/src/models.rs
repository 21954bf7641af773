//! Core data models used throughout Engine RAG.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and question-answering pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metadata key carrying the corpus tag (`trace` or `code`).
pub const META_SOURCE: &str = "source";
/// Metadata key carrying the artifact path a document was read from.
pub const META_FILE_PATH: &str = "file_path";

/// One of the two independent text sources a session indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corpus {
    /// The machine-generated execution trace of the matching engine.
    Instrumentation,
    /// The matching engine's own source text.
    Code,
}

impl Corpus {
    /// Value of the `source` metadata key for documents of this corpus.
    pub fn source_tag(&self) -> &'static str {
        match self {
            Corpus::Instrumentation => "trace",
            Corpus::Code => "code",
        }
    }

    /// Name of the session-level index handle for this corpus.
    pub fn index_name(&self) -> &'static str {
        match self {
            Corpus::Instrumentation => "instrumentation_index",
            Corpus::Code => "code_index",
        }
    }

    /// Human-readable label used in prompts and console output.
    pub fn label(&self) -> &'static str {
        match self {
            Corpus::Instrumentation => "instrumentation log",
            Corpus::Code => "source code",
        }
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The user-selected query target.
///
/// Parsed once at the input boundary and passed downstream as a closed
/// variant; nothing below the session re-inspects the raw prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Instrumentation,
    Code,
    Both,
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instr" | "instrumentation" | "trace" => Ok(QueryMode::Instrumentation),
            "code" | "source" => Ok(QueryMode::Code),
            "both" => Ok(QueryMode::Both),
            other => Err(format!(
                "unknown query mode '{}'. Use instr, code, or both.",
                other
            )),
        }
    }
}

/// An immutable unit of loaded text plus provenance metadata.
///
/// Created once by a loader and moved into the index builder. The
/// `source` metadata key is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a document tagged with the given corpus.
    pub fn new(corpus: Corpus, text: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE.to_string(), corpus.source_tag().to_string());
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Attach a provenance entry. The `source` key cannot be overwritten.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key != META_SOURCE {
            self.metadata.insert(key, value.into());
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// The corpus tag (`trace` or `code`).
    pub fn source(&self) -> &str {
        self.metadata
            .get(META_SOURCE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The artifact path, if the loader recorded one.
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get(META_FILE_PATH).map(String::as_str)
    }
}

/// A contiguous window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic UUID derived from the document's provenance and the
    /// chunk ordinal.
    pub id: String,
    /// Position of the parent document in the build input.
    pub document_index: usize,
    /// Position of this chunk within its document, contiguous from 0.
    pub chunk_index: usize,
    /// Offset of the first character of this chunk in the document text.
    pub start_char: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    /// Metadata inherited from the parent document.
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Length of this chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk returned from similarity search along with its score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_source_tag() {
        let doc = Document::new(Corpus::Instrumentation, "ORDER_IN id=1");
        assert_eq!(doc.source(), "trace");
        let doc = Document::new(Corpus::Code, "class Order {}");
        assert_eq!(doc.source(), "code");
    }

    #[test]
    fn test_source_tag_is_not_overwritten() {
        let doc = Document::new(Corpus::Code, "x")
            .with_metadata("source", "trace")
            .with_metadata("language", "java");
        assert_eq!(doc.source(), "code");
        assert_eq!(doc.metadata().get("language").unwrap(), "java");
    }

    #[test]
    fn test_query_mode_parse() {
        assert_eq!("instr".parse::<QueryMode>(), Ok(QueryMode::Instrumentation));
        assert_eq!("CODE".parse::<QueryMode>(), Ok(QueryMode::Code));
        assert_eq!("both".parse::<QueryMode>(), Ok(QueryMode::Both));
        assert!("all".parse::<QueryMode>().is_err());
    }
}
