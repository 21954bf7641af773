//! Error taxonomy for the retrieval-and-synthesis pipeline.
//!
//! Startup-phase variants (`NotFound`, `EmptyCorpus`, `IndexBuild`, `Io`)
//! are fatal for the session; query-phase variants (`NotIndexed`,
//! `Collaborator`) are reported per query and the session continues.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Corpus;

pub type RagResult<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// A required artifact or path does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Loading produced zero documents (or zero chunks) for a corpus.
    #[error("no {corpus} documents found to index")]
    EmptyCorpus { corpus: Corpus },

    /// The embedding collaborator failed while building an index.
    #[error("failed to build {} for the {corpus}: {source:#}", .corpus.index_name())]
    IndexBuild {
        corpus: Corpus,
        source: anyhow::Error,
    },

    /// A query needed an index that has not been built.
    #[error("{corpus} not indexed: {} has not been built", .corpus.index_name())]
    NotIndexed { corpus: Corpus },

    /// An embedding, search, or completion call failed at query time.
    #[error("{stage} failed: {source:#}")]
    Collaborator {
        stage: &'static str,
        source: anyhow::Error,
    },

    /// An artifact exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RagError {
    pub(crate) fn collaborator(stage: &'static str, source: anyhow::Error) -> Self {
        RagError::Collaborator { stage, source }
    }

    /// True for errors a session survives (reported per query).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::NotIndexed { .. } | RagError::Collaborator { .. }
        )
    }
}
