//! Similarity-search abstraction for corpus indices.
//!
//! The [`VectorStore`] trait is the seam for the nearest-neighbour
//! collaborator. The bundled [`memory::InMemoryVectorStore`] does a
//! brute-force cosine scan; a networked vector database can implement the
//! same trait and be wrapped with [`CorpusIndex::from_store`](crate::index::CorpusIndex::from_store).
//!
//! Implementations must be `Send + Sync` and are read-only once built.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ScoredChunk;

/// A searchable collection of (chunk, vector) pairs.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of stored chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return up to `top_k` chunks ordered by descending similarity to
    /// `query_vec`. Equal scores keep insertion order.
    async fn similarity_search(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;
}
