//! TOML configuration.
//!
//! Every section is optional; omitted values fall back to the defaults of
//! the reference pipeline (1024-token chunks with 20-token overlap, five
//! retrieved chunks, `text-embedding-3-small`, Claude Opus).
//!
//! ```toml
//! [corpus]
//! trace_path = "instrumentation.log"
//! source_dirs = ["src/main/java/com/matching", "agent/src/main/java/com/matching"]
//! extensions = ["java"]
//! language = "java"
//!
//! [chunking]
//! chunk_tokens = 1024
//! overlap_tokens = 20
//!
//! [retrieval]
//! top_k = 5
//! context_window_tokens = 8000
//!
//! [embedding]
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [llm]
//! model = "claude-opus-4-20250514"
//! temperature = 0.1
//! max_tokens = 4096
//! ```

use anyhow::{bail, Context, Result};
use engine_rag_core::chunk::{tokens_to_chars, ChunkParams, CHARS_PER_TOKEN};
use engine_rag_core::query::QuerySettings;
use engine_rag_core::retry::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_trace_path")]
    pub trace_path: PathBuf,
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,
    /// File extensions (without the dot) collected from the source dirs.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            trace_path: default_trace_path(),
            source_dirs: default_source_dirs(),
            extensions: default_extensions(),
            exclude_globs: Vec::new(),
            language: default_language(),
            follow_symlinks: false,
        }
    }
}

fn default_trace_path() -> PathBuf {
    PathBuf::from("instrumentation.log")
}
fn default_source_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("src/main/java/com/matching"),
        PathBuf::from("agent/src/main/java/com/matching"),
    ]
}
fn default_extensions() -> Vec<String> {
    vec!["java".to_string()]
}
fn default_language() -> String {
    "java".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::from_tokens(self.chunk_tokens, self.overlap_tokens)
    }
}

fn default_chunk_tokens() -> usize {
    1024
}
fn default_overlap_tokens() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Context budget for one completion call during tree summarize.
    #[serde(default = "default_context_window_tokens")]
    pub context_window_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_window_tokens: default_context_window_tokens(),
        }
    }
}

impl RetrievalConfig {
    pub fn settings(&self) -> QuerySettings {
        QuerySettings {
            top_k: self.top_k,
            context_window_chars: self.context_window_tokens.saturating_mul(CHARS_PER_TOKEN),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_context_window_tokens() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_url")]
    pub url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
            url: default_openai_url(),
        }
    }
}

impl EmbeddingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_anthropic_url")]
    pub url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
            url: default_anthropic_url(),
        }
    }
}

impl LlmConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_llm_provider() -> String {
    "anthropic".to_string()
}
fn default_llm_model() -> String {
    "claude-opus-4-20250514".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

/// Load configuration.
///
/// With `path = None` the default location (`./config/erag.toml`) is used
/// if present, otherwise built-in defaults. An explicitly given path must
/// exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => parse_file(p)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                parse_file(default_path)?
            } else {
                Config::default()
            }
        }
    };
    validate(&config)?;
    Ok(config)
}

pub const DEFAULT_CONFIG_PATH: &str = "./config/erag.toml";

fn parse_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    config
        .chunking
        .params()
        .context("invalid [chunking] section")?;

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.context_window_tokens == 0 {
        bail!("retrieval.context_window_tokens must be > 0");
    }
    tokens_to_chars(config.retrieval.context_window_tokens, "context window")
        .context("invalid [retrieval] section")?;
    if config.corpus.extensions.is_empty() {
        bail!("corpus.extensions must list at least one extension");
    }
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "openai" => {}
        other => bail!("Unknown embedding provider: '{}'. Must be openai.", other),
    }
    match config.llm.provider.as_str() {
        "anthropic" => {}
        other => bail!("Unknown llm provider: '{}'. Must be anthropic.", other),
    }
    if !(0.0..=1.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 1.0]");
    }

    Ok(())
}
