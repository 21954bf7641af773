//! # Engine RAG
//!
//! Question answering over a matching engine's execution trace and its
//! source code.
//!
//! Two independent corpora are loaded, chunked, embedded and held in
//! memory. A question is routed to one corpus, or to both followed by a
//! synthesis pass that explains the runtime behaviour in terms of the code
//! that produced it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ trace file   │──▶│              │──▶│ instrumentation_index │──┐
//! └──────────────┘   │ chunk+embed  │   └──────────────────────┘  │   ┌───────────┐
//! ┌──────────────┐   │  (OpenAI)    │   ┌──────────────────────┐  ├──▶│ synthesis │
//! │ source tree  │──▶│              │──▶│      code_index       │──┘   │ (Claude)  │
//! └──────────────┘   └──────────────┘   └──────────────────────┘      └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`credentials`] | API keys from the environment or `.env` |
//! | [`loader`] | Trace and source tree loaders |
//! | [`embedding`] | OpenAI embedding provider |
//! | [`llm`] | Anthropic completion provider |
//! | [`session`] | Index ownership, command parsing and the REPL |
//! | [`stats`] | Offline corpus statistics |
//!
//! Runtime-agnostic pieces (chunking, indexing, retrieval, synthesis) live
//! in the `engine-rag-core` crate and are re-exported as [`core`].

pub mod config;
pub mod credentials;
pub mod embedding;
pub mod llm;
pub mod loader;
pub mod session;
pub mod stats;

pub use engine_rag_core as core;
