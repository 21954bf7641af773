//! # Engine RAG Core
//!
//! Runtime-agnostic logic for Engine RAG: data models, chunking, the
//! collaborator traits (embedding, vector search, completion), index
//! building, per-corpus retrieval and the cross-corpus synthesis pass.
//!
//! This crate contains no tokio, filesystem I/O, or HTTP clients. Concrete
//! collaborators and the interactive session live in the `engine-rag` app
//! crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod query;
pub mod retry;
pub mod store;
pub mod synthesis;

pub use error::{RagError, RagResult};
pub use models::{Chunk, Corpus, Document, QueryMode, ScoredChunk};
