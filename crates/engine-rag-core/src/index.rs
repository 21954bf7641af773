//! Per-corpus index construction.
//!
//! [`IndexBuilder::build`] chunks a corpus's documents, embeds every chunk
//! through the [`Embedder`] collaborator and returns a fully built
//! [`CorpusIndex`]. A build either returns a complete index or an error;
//! vectors embedded before a failure are dropped with the builder's local
//! state and never become reachable.
//!
//! ```text
//! Vec<Document> ──chunk_corpus──▶ Vec<Chunk> ──embed (batched)──▶ InMemoryVectorStore
//!                                                                        │
//!                                                                  CorpusIndex
//! ```

use tracing::{debug, info};

use crate::chunk::{chunk_document, ChunkParams};
use crate::embedding::Embedder;
use crate::error::{RagError, RagResult};
use crate::models::{Chunk, Corpus, Document, ScoredChunk};
use crate::store::memory::InMemoryVectorStore;
use crate::store::VectorStore;

/// Default number of chunk texts sent per embedding call.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

/// Position of one chunk within the corpus it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub document_index: usize,
    pub chunk_index: usize,
    pub start_char: usize,
    pub char_len: usize,
}

impl From<&Chunk> for ChunkSpan {
    fn from(c: &Chunk) -> Self {
        Self {
            document_index: c.document_index,
            chunk_index: c.chunk_index,
            start_char: c.start_char,
            char_len: c.char_len(),
        }
    }
}

/// A fully built, read-only searchable index for one corpus.
pub struct CorpusIndex {
    corpus: Corpus,
    store: Box<dyn VectorStore>,
    document_count: usize,
    spans: Vec<ChunkSpan>,
}

impl CorpusIndex {
    /// Wrap an already populated store, e.g. an external vector database.
    pub fn from_store(
        corpus: Corpus,
        store: Box<dyn VectorStore>,
        document_count: usize,
        spans: Vec<ChunkSpan>,
    ) -> Self {
        Self {
            corpus,
            store,
            document_count,
            spans,
        }
    }

    pub fn corpus(&self) -> Corpus {
        self.corpus
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn chunk_count(&self) -> usize {
        self.store.len()
    }

    /// Chunk boundaries in build order.
    pub fn spans(&self) -> &[ChunkSpan] {
        &self.spans
    }

    /// Retrieve the `top_k` chunks most similar to `query_vec`.
    pub async fn search(&self, query_vec: &[f32], top_k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        self.store.similarity_search(query_vec, top_k).await
    }
}

impl std::fmt::Debug for CorpusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusIndex")
            .field("corpus", &self.corpus)
            .field("documents", &self.document_count)
            .field("chunks", &self.store.len())
            .finish()
    }
}

/// Chunk every document of a corpus, in input order.
///
/// Fails with [`RagError::EmptyCorpus`] when there are no documents or all
/// of them are empty text.
pub fn chunk_corpus(
    corpus: Corpus,
    documents: &[Document],
    params: &ChunkParams,
) -> RagResult<Vec<Chunk>> {
    if documents.is_empty() {
        return Err(RagError::EmptyCorpus { corpus });
    }
    let chunks: Vec<Chunk> = documents
        .iter()
        .enumerate()
        .flat_map(|(i, doc)| chunk_document(i, doc, params))
        .collect();
    if chunks.is_empty() {
        return Err(RagError::EmptyCorpus { corpus });
    }
    Ok(chunks)
}

/// Builds [`CorpusIndex`]es with a fixed embedder and chunk geometry.
pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    params: ChunkParams,
    batch_size: usize,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder, params: ChunkParams) -> Self {
        Self {
            embedder,
            params,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    /// Override the number of texts per embedding call (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Chunk, embed and index `documents` for `corpus`.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if nothing is left to index.
    /// - [`RagError::IndexBuild`] if any embedding call fails or returns
    ///   the wrong number of vectors.
    pub async fn build(&self, corpus: Corpus, documents: Vec<Document>) -> RagResult<CorpusIndex> {
        let document_count = documents.len();
        let chunks = chunk_corpus(corpus, &documents, &self.params)?;
        drop(documents);

        info!(
            corpus = corpus.index_name(),
            documents = document_count,
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "building index"
        );

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self
                .embedder
                .embed_texts(&texts)
                .await
                .map_err(|source| RagError::IndexBuild { corpus, source })?;
            if embedded.len() != texts.len() {
                return Err(RagError::IndexBuild {
                    corpus,
                    source: anyhow::anyhow!(
                        "embedding batch {} returned {} vectors for {} chunks",
                        batch_no,
                        embedded.len(),
                        texts.len()
                    ),
                });
            }
            debug!(corpus = corpus.index_name(), batch = batch_no, size = texts.len(), "embedded batch");
            vectors.extend(embedded);
        }

        let spans: Vec<ChunkSpan> = chunks.iter().map(ChunkSpan::from).collect();
        let store = InMemoryVectorStore::from_entries(chunks.into_iter().zip(vectors));

        Ok(CorpusIndex::from_store(
            corpus,
            Box::new(store),
            document_count,
            spans,
        ))
    }
}
