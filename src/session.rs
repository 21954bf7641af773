//! Interactive session: index ownership, command parsing and dispatch.
//!
//! A [`Session`] owns the two corpus index handles for the lifetime of the
//! process. Indices start absent, are built by explicit indexing calls, and
//! are only replaced wholesale: a rebuild discards the old index first, so
//! a failed rebuild leaves the corpus unindexed rather than half-built.
//!
//! # Commands
//!
//! | Input | Action |
//! |-------|--------|
//! | `/instr <question>` | Ask the instrumentation log only |
//! | `/code <question>` | Ask the source code only |
//! | `/both <question>` | Ask both and synthesize |
//! | `<question>` | Same as `/both` |
//! | `/help` | Show commands |
//! | `/quit`, `/exit` | End the session |

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use engine_rag_core::chunk::ChunkParams;
use engine_rag_core::embedding::Embedder;
use engine_rag_core::index::{CorpusIndex, IndexBuilder};
use engine_rag_core::llm::Completion;
use engine_rag_core::models::{Corpus, Document, QueryMode};
use engine_rag_core::query::{QueryEngine, QuerySettings};
use engine_rag_core::synthesis::Synthesizer;
use engine_rag_core::RagResult;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::embedding::OpenAIEmbedder;
use crate::llm::AnthropicClient;
use crate::loader::{load_source_tree, load_trace, SourceFilter};

pub const HELP_TEXT: &str = "Available commands:
  /instr <query>  - Query instrumentation log only
  /code <query>   - Query source code only
  /both <query>   - Query both (synthesized answer)
  /help           - Show this help
  /quit           - Exit";

const PROMPT: &str = "query> ";

/// Tunables shared by indexing and querying.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub chunk_params: ChunkParams,
    pub embed_batch_size: usize,
    pub query: QuerySettings,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            chunk_params: config.chunking.params()?,
            embed_batch_size: config.embedding.batch_size,
            query: config.retrieval.settings(),
        })
    }
}

/// Outcome of one indexing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    pub corpus: Corpus,
    pub documents: usize,
    pub chunks: usize,
}

/// Process-lifetime state: collaborators plus the two index handles.
pub struct Session {
    embedder: Arc<dyn Embedder>,
    engine: QueryEngine,
    settings: SessionSettings,
    instrumentation_index: Option<CorpusIndex>,
    code_index: Option<CorpusIndex>,
}

impl Session {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn Completion>,
        settings: SessionSettings,
    ) -> Self {
        let engine = QueryEngine::new(embedder.clone(), llm, settings.query);
        Self {
            embedder,
            engine,
            settings,
            instrumentation_index: None,
            code_index: None,
        }
    }

    /// Build a session backed by the configured network collaborators.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let embedder = OpenAIEmbedder::new(&config.embedding, &credentials.embedding_api_key)?;
        let llm = AnthropicClient::new(&config.llm, &credentials.reasoning_api_key)?;
        Ok(Self::new(
            Arc::new(embedder),
            Arc::new(llm),
            SessionSettings::from_config(config)?,
        ))
    }

    /// The built index for `corpus`, if any.
    pub fn index(&self, corpus: Corpus) -> Option<&CorpusIndex> {
        match corpus {
            Corpus::Instrumentation => self.instrumentation_index.as_ref(),
            Corpus::Code => self.code_index.as_ref(),
        }
    }

    /// True once both indices exist.
    pub fn is_ready(&self) -> bool {
        self.instrumentation_index.is_some() && self.code_index.is_some()
    }

    fn slot(&mut self, corpus: Corpus) -> &mut Option<CorpusIndex> {
        match corpus {
            Corpus::Instrumentation => &mut self.instrumentation_index,
            Corpus::Code => &mut self.code_index,
        }
    }

    /// Build (or rebuild) the index for `corpus` from `documents`.
    pub async fn index_documents(
        &mut self,
        corpus: Corpus,
        documents: Vec<Document>,
    ) -> RagResult<IndexSummary> {
        self.rebuild(corpus, || Ok(documents)).await
    }

    /// Load and index the execution trace.
    pub async fn index_instrumentation(&mut self, path: &Path) -> RagResult<IndexSummary> {
        self.rebuild(Corpus::Instrumentation, || Ok(vec![load_trace(path)?]))
            .await
    }

    /// Load and index the source tree.
    pub async fn index_source_code(
        &mut self,
        dirs: &[PathBuf],
        filter: &SourceFilter,
    ) -> RagResult<IndexSummary> {
        self.rebuild(Corpus::Code, || load_source_tree(dirs, filter))
            .await
    }

    async fn rebuild<F>(&mut self, corpus: Corpus, load: F) -> RagResult<IndexSummary>
    where
        F: FnOnce() -> RagResult<Vec<Document>>,
    {
        // Discard first: a failed load or build must not leave the old index reachable.
        *self.slot(corpus) = None;
        let documents = load()?;

        let index = IndexBuilder::new(self.embedder.as_ref(), self.settings.chunk_params)
            .with_batch_size(self.settings.embed_batch_size)
            .build(corpus, documents)
            .await?;

        let summary = IndexSummary {
            corpus,
            documents: index.document_count(),
            chunks: index.chunk_count(),
        };
        info!(corpus = corpus.index_name(), chunks = summary.chunks, "index ready");
        *self.slot(corpus) = Some(index);
        Ok(summary)
    }

    /// Answer `question` in the given mode.
    pub async fn ask(&self, mode: QueryMode, question: &str) -> RagResult<String> {
        match mode {
            QueryMode::Instrumentation => {
                self.engine
                    .answer(Corpus::Instrumentation, self.index(Corpus::Instrumentation), question)
                    .await
            }
            QueryMode::Code => {
                self.engine
                    .answer(Corpus::Code, self.index(Corpus::Code), question)
                    .await
            }
            QueryMode::Both => {
                let answer = Synthesizer::new(&self.engine)
                    .answer_both(
                        self.index(Corpus::Instrumentation),
                        self.index(Corpus::Code),
                        question,
                    )
                    .await?;
                Ok(answer.merged)
            }
        }
    }
}

/// Check credentials, then build both indices from the configured corpora.
///
/// Any failure here is fatal for the process.
pub async fn start_session(config: &Config) -> Result<Session> {
    let credentials = Credentials::from_env()?;
    let mut session = Session::from_config(config, &credentials)?;
    let filter = SourceFilter::from_config(&config.corpus)?;

    println!("Indexing instrumentation log: {}", config.corpus.trace_path.display());
    let summary = session
        .index_instrumentation(&config.corpus.trace_path)
        .await
        .context("Failed to index instrumentation log")?;
    println!("  indexed {} chunks", summary.chunks);

    println!("Indexing source code...");
    let summary = session
        .index_source_code(&config.corpus.source_dirs, &filter)
        .await
        .context("Failed to index source code")?;
    println!(
        "  indexed {} files ({} chunks)",
        summary.documents, summary.chunks
    );

    Ok(session)
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank input; re-prompt.
    Noop,
    Exit,
    Help,
    /// A mode prefix with no question after it.
    MissingQuestion(QueryMode),
    Ask { mode: QueryMode, question: String },
}

/// Parse one input line into a [`Command`].
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Noop;
    }
    match line {
        "/quit" | "/exit" => return Command::Exit,
        "/help" => return Command::Help,
        "/instr" => return Command::MissingQuestion(QueryMode::Instrumentation),
        "/code" => return Command::MissingQuestion(QueryMode::Code),
        "/both" => return Command::MissingQuestion(QueryMode::Both),
        _ => {}
    }

    let prefixes = [
        ("/instr ", QueryMode::Instrumentation),
        ("/code ", QueryMode::Code),
        ("/both ", QueryMode::Both),
    ];
    for (prefix, mode) in prefixes {
        if let Some(rest) = line.strip_prefix(prefix) {
            let question = rest.trim();
            if question.is_empty() {
                return Command::MissingQuestion(mode);
            }
            return Command::Ask {
                mode,
                question: question.to_string(),
            };
        }
    }

    Command::Ask {
        mode: QueryMode::Both,
        question: line.to_string(),
    }
}

fn mode_banner(mode: QueryMode) -> &'static str {
    match mode {
        QueryMode::Instrumentation => "Querying instrumentation log...",
        QueryMode::Code => "Querying source code...",
        QueryMode::Both => "Querying both sources...",
    }
}

/// Read `input` line by line on a dedicated OS thread.
///
/// Blocking reads never run on the async runtime, so an interrupt can end
/// the session (and the runtime can shut down) while a read is pending.
/// Lines are decoded lossily: invalid UTF-8 never ends the stream. The
/// channel closes at end of input, or after the first read error.
pub fn spawn_line_reader<R>(mut input: R) -> mpsc::Receiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let line = match input.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => Ok(String::from_utf8_lossy(&buf).into_owned()),
                Err(e) => Err(e),
            };
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Read-eval-print loop over `lines`, writing answers and errors to `out`.
///
/// Ends cleanly on an exit command, end of input, or an interrupt while
/// waiting for input. Query errors are printed and the loop continues. An
/// interrupt while a query is in flight abandons it and returns an error.
pub async fn run_repl<W>(
    session: &Session,
    mut lines: mpsc::Receiver<io::Result<String>>,
    out: &mut W,
) -> Result<()>
where
    W: Write,
{
    loop {
        write!(out, "\n{}", PROMPT)?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                warn!(error = %e, "failed to read input");
                writeln!(out, "\nError reading input: {}", e)?;
                break;
            }
            None => {
                writeln!(out, "\nGoodbye!")?;
                break;
            }
        };

        match parse_command(&line) {
            Command::Noop => continue,
            Command::Exit => {
                writeln!(out, "Goodbye!")?;
                break;
            }
            Command::Help => writeln!(out, "{}", HELP_TEXT)?,
            Command::MissingQuestion(_) => {
                writeln!(out, "Please provide a question after the command.\n{}", HELP_TEXT)?
            }
            Command::Ask { mode, question } => {
                writeln!(out, "{}", mode_banner(mode))?;
                out.flush()?;
                let result = tokio::select! {
                    result = session.ask(mode, &question) => result,
                    _ = tokio::signal::ctrl_c() => bail!("interrupted while answering a query"),
                };
                match result {
                    Ok(answer) => writeln!(out, "\n{}", answer)?,
                    Err(e) => {
                        warn!(error = %e, "query failed");
                        writeln!(out, "\nError: {}", e)?;
                    }
                }
            }
        }
    }

    Ok(())
}
