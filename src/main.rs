//! # Engine RAG CLI (`erag`)
//!
//! Indexes a matching engine's execution trace and source tree, then
//! answers questions about them.
//!
//! ## Usage
//!
//! ```bash
//! erag [--config ./config/erag.toml] [--trace FILE] [--source-dir DIR]... <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `erag chat` | Interactive session (default) |
//! | `erag ask --mode <instr\|code\|both> "<question>"` | One-shot question |
//! | `erag stats` | Load and chunk both corpora, print counts (offline) |
//!
//! `chat` and `ask` need `OPENAI_API_KEY` and `ANTHROPIC_API_KEY`, either
//! exported or in a `.env` file.

use std::io::BufReader;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine_rag::config::load_config;
use engine_rag::core::QueryMode;
use engine_rag::session::{run_repl, spawn_line_reader, start_session, HELP_TEXT};
use engine_rag::stats::run_stats;
use tracing_subscriber::EnvFilter;

/// Engine RAG: ask questions about a matching engine's execution trace
/// and the code that produced it.
#[derive(Parser)]
#[command(name = "erag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/erag.toml` when present, otherwise built-in
    /// defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Execution trace to index (overrides `[corpus].trace_path`).
    #[arg(long, global = true)]
    trace: Option<PathBuf>,

    /// Source directory to index; repeatable (overrides `[corpus].source_dirs`).
    #[arg(long = "source-dir", global = true)]
    source_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Index both corpora and start an interactive session.
    Chat,

    /// Index both corpora and answer a single question.
    Ask {
        /// Which corpus to query: `instr`, `code`, or `both`.
        #[arg(long, default_value = "both")]
        mode: QueryMode,

        /// The question.
        question: String,
    },

    /// Print document and chunk counts for both corpora.
    ///
    /// Needs no credentials and makes no network calls.
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(trace) = cli.trace {
        config.corpus.trace_path = trace;
    }
    if !cli.source_dirs.is_empty() {
        config.corpus.source_dirs = cli.source_dirs;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Stats => run_stats(&config)?,
        Commands::Ask { mode, question } => {
            let session = start_session(&config).await?;
            let answer = session.ask(mode, &question).await?;
            println!("\n{}", answer);
        }
        Commands::Chat => {
            let session = start_session(&config).await?;
            println!("\nMatching engine RAG system ready!\n");
            println!("{}", HELP_TEXT);
            let lines = spawn_line_reader(BufReader::new(std::io::stdin()));
            run_repl(&session, lines, &mut std::io::stdout()).await?;
        }
    }

    Ok(())
}
