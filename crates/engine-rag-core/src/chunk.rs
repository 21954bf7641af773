//! Fixed-window, fixed-overlap text chunker.
//!
//! Splits document text into [`Chunk`]s of `chunk_size` characters, each
//! window starting `chunk_size - chunk_overlap` characters after the
//! previous one. Windows are measured in Unicode scalar values, so a split
//! never lands inside a multi-byte character.
//!
//! Each chunk receives a deterministic UUID derived from its document's
//! provenance and its ordinal, plus a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Convert the configured token sizes to characters at 4 chars/token.
//! 2. Emit the window `[start, min(start + size, len))`.
//! 3. Stop once a window reaches the end of the text; otherwise advance
//!    `start` by `size - overlap` and repeat.
//!
//! Consecutive chunks of one document therefore share exactly `overlap`
//! characters, and only the final chunk can be shorter than `size`.
//!
//! # Example
//!
//! ```rust
//! use engine_rag_core::chunk::{chunk_document, ChunkParams};
//! use engine_rag_core::models::{Corpus, Document};
//!
//! let params = ChunkParams::new(10, 2).unwrap();
//! let doc = Document::new(Corpus::Instrumentation, "ORDER_IN id=1 side=BUY");
//! let chunks = chunk_document(0, &doc, &params);
//! assert_eq!(chunks[0].text, "ORDER_IN i");
//! assert_eq!(chunks[1].text, " id=1 side");
//! ```

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Approximate characters-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

/// Window geometry for the chunker, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkParams {
    /// Validate and build chunk parameters measured in characters.
    ///
    /// Fails if `chunk_size` is zero or `chunk_overlap >= chunk_size`
    /// (the window would never advance).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Build chunk parameters from token counts (`× CHARS_PER_TOKEN`).
    ///
    /// Fails if either count does not fit in characters.
    pub fn from_tokens(chunk_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        Self::new(
            tokens_to_chars(chunk_tokens, "chunk")?,
            tokens_to_chars(overlap_tokens, "overlap")?,
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Convert a token count to characters, rejecting overflow.
pub fn tokens_to_chars(tokens: usize, what: &str) -> Result<usize> {
    match tokens.checked_mul(CHARS_PER_TOKEN) {
        Some(chars) => Ok(chars),
        None => bail!("{} of {} tokens is too large", what, tokens),
    }
}

/// Split one document into overlapping chunks.
///
/// Returns chunks with contiguous `chunk_index` values starting at 0.
/// Empty text yields no chunks.
///
/// # Guarantees
///
/// - Deterministic: identical inputs give identical ids, offsets and text.
/// - Consecutive chunks overlap by exactly `chunk_overlap` characters.
/// - Every chunk except the last is exactly `chunk_size` characters.
pub fn chunk_document(document_index: usize, doc: &Document, params: &ChunkParams) -> Vec<Chunk> {
    let text = doc.text();
    // Byte offset of every char, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = bounds.len();
    bounds.push(text.len());

    let mut chunks = Vec::new();
    if char_count == 0 {
        return chunks;
    }

    let id_seed = format!(
        "{}:{}:{}",
        doc.source(),
        doc.file_path().unwrap_or_default(),
        document_index
    );

    let mut start = 0usize;
    loop {
        let end = (start + params.chunk_size).min(char_count);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(doc, &id_seed, document_index, chunks.len(), start, piece));
        if end == char_count {
            break;
        }
        start += params.step();
    }

    chunks
}

/// Create a single [`Chunk`] with a name-based UUID and SHA-256 content hash.
fn make_chunk(
    doc: &Document,
    id_seed: &str,
    document_index: usize,
    chunk_index: usize,
    start_char: usize,
    text: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}#{}", id_seed, chunk_index).as_bytes(),
    );

    Chunk {
        id: id.to_string(),
        document_index,
        chunk_index,
        start_char,
        text: text.to_string(),
        hash,
        metadata: doc.metadata().clone(),
    }
}
