//! In-memory [`VectorStore`] implementation.
//!
//! Entries are held in a `Vec` in insertion order and never mutated after
//! construction, so no locking is needed for concurrent readers. Search is
//! brute-force cosine similarity over all stored vectors.

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

use super::VectorStore;

struct StoredVector {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Immutable in-memory store of chunk embeddings.
pub struct InMemoryVectorStore {
    entries: Vec<StoredVector>,
}

impl InMemoryVectorStore {
    /// Build a store from (chunk, vector) pairs, keeping their order.
    pub fn from_entries(entries: impl IntoIterator<Item = (Chunk, Vec<f32>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(chunk, vector)| StoredVector { chunk, vector })
                .collect(),
        }
    }

    /// Stored chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|sv| &sv.chunk)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn similarity_search(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, sv)| (i, cosine_similarity(query_vec, &sv.vector)))
            .collect();

        // `sort_by` is stable, so equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}
