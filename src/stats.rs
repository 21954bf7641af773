//! Corpus statistics without any network calls.
//!
//! Loads and chunks both corpora exactly as indexing would, then prints
//! document and chunk counts. Used by `erag stats` to check corpus paths
//! and chunking settings before spending embedding calls on them.

use anyhow::Result;
use engine_rag_core::chunk::ChunkParams;
use engine_rag_core::index::chunk_corpus;
use engine_rag_core::models::{Corpus, Document};
use engine_rag_core::RagError;

use crate::config::Config;
use crate::loader::{load_source_tree, load_trace, SourceFilter};

/// Document and chunk counts for one corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub corpus: Corpus,
    pub documents: usize,
    pub chunks: usize,
    pub chars: usize,
    /// Why the corpus could not be loaded, if it could not.
    pub error: Option<String>,
}

impl CorpusStats {
    fn failed(corpus: Corpus, err: RagError) -> Self {
        Self {
            corpus,
            documents: 0,
            chunks: 0,
            chars: 0,
            error: Some(err.to_string()),
        }
    }
}

/// Load and chunk both corpora, collecting counts.
pub fn collect_stats(config: &Config) -> Result<Vec<CorpusStats>> {
    let params = config.chunking.params()?;
    let filter = SourceFilter::from_config(&config.corpus)?;

    let loaded = [
        (
            Corpus::Instrumentation,
            load_trace(&config.corpus.trace_path).map(|d| vec![d]),
        ),
        (
            Corpus::Code,
            load_source_tree(&config.corpus.source_dirs, &filter),
        ),
    ];

    let stats = loaded
        .into_iter()
        .map(|(corpus, docs)| match docs {
            Ok(docs) => count(corpus, &docs, &params),
            Err(e) => CorpusStats::failed(corpus, e),
        })
        .collect();
    Ok(stats)
}

fn count(corpus: Corpus, docs: &[Document], params: &ChunkParams) -> CorpusStats {
    let chars = docs.iter().map(|d| d.text().chars().count()).sum();
    match chunk_corpus(corpus, docs, params) {
        Ok(chunks) => CorpusStats {
            corpus,
            documents: docs.len(),
            chunks: chunks.len(),
            chars,
            error: None,
        },
        Err(e) => CorpusStats::failed(corpus, e),
    }
}

/// Run the stats command: collect counts and print a summary.
///
/// Fails if either corpus could not be loaded.
pub fn run_stats(config: &Config) -> Result<()> {
    let stats = collect_stats(config)?;

    println!("Engine RAG — Corpus Stats");
    println!("=========================");
    println!();
    let params = config.chunking.params()?;
    println!(
        "  Chunking:    {} chars, {} overlap",
        params.chunk_size(),
        params.chunk_overlap()
    );

    let mut failed = 0;
    for s in &stats {
        println!();
        println!("  {} ({})", s.corpus.index_name(), s.corpus.label());
        match &s.error {
            None => {
                println!("    Documents: {}", s.documents);
                println!("    Chunks:    {}", s.chunks);
                println!("    Chars:     {}", s.chars);
            }
            Some(e) => {
                failed += 1;
                println!("    Error:     {}", e);
            }
        }
    }
    println!();

    if failed > 0 {
        anyhow::bail!("{} corpus(es) could not be loaded", failed);
    }
    Ok(())
}
