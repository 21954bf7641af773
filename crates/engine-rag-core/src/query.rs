//! Per-corpus question answering.
//!
//! [`QueryEngine::answer`] embeds the question with the indexing embedder,
//! retrieves the `top_k` most similar chunks from one [`CorpusIndex`], and
//! asks the reasoning collaborator to answer from that context only.
//!
//! # Tree summarize
//!
//! Retrieved chunk texts are packed, in rank order, into groups that fit the
//! configured context budget. A single group is answered with one
//! completion call. Otherwise every group produces a partial answer, and
//! the partial answers are packed and reduced the same way until a single
//! answer remains. If packing cannot shrink a level (every text alone
//! exceeds half the budget), texts are paired so each level still halves.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{RagError, RagResult};
use crate::index::CorpusIndex;
use crate::llm::{ChatMessage, Completion};
use crate::models::Corpus;

/// Returned when retrieval finds nothing; no completion call is made.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context was retrieved for this question.";

const SYSTEM_PROMPT: &str = "You are an expert on an order matching engine. \
Answer strictly from the provided context. If the context does not contain the answer, say so.";

/// Retrieval settings for a [`QueryEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySettings {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Maximum characters of context packed into one completion call.
    pub context_window_chars: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_window_chars: 32_000,
        }
    }
}

/// Vocabulary preamble telling the model how to read a corpus.
pub fn corpus_vocabulary(corpus: Corpus) -> &'static str {
    match corpus {
        Corpus::Instrumentation => {
            "Based on the instrumentation log data, answer the following question.\n\
The log contains execution traces with:\n\
- Function metadata (UUID mappings to function names and descriptions)\n\
- ORDER_IN events (incoming orders with orderId, side, orderType, qty, price)\n\
- CALL events (function calls with UUIDs)\n\
- EXEC_REPORT events (execution reports with qty, lastQty, cumQty, price)\n\
- BOOK_ADD events (orders added to book with remainingQty, cumQty)\n\
- SNAPSHOT events (order book state after each order)"
        }
        Corpus::Code => {
            "Based on the Java source code for the matching engine, answer the following question.\n\
The codebase contains:\n\
- Matching engine core logic (order matching, execution)\n\
- Order book implementation (price-time priority)\n\
- Model classes (Order, ExecutionReport, Side, OrderType, ExecutionType)\n\
- CSV I/O handlers\n\
- Java agent for instrumentation"
        }
    }
}

/// Build the grounding prompt for one completion call.
pub fn grounding_messages(corpus: Corpus, question: &str, context: &[String]) -> Vec<ChatMessage> {
    let user = format!(
        "{vocab}\n\n\
Context information from the {label} is below.\n\
---------------------\n\
{context}\n\
---------------------\n\
Using only the context information above and no prior knowledge, answer the question.\n\
Question: {question}\n\
Answer:",
        vocab = corpus_vocabulary(corpus),
        label = corpus.label(),
        context = context.join("\n\n"),
        question = question,
    );
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Answers questions against a single corpus index.
#[derive(Clone)]
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn Completion>,
    settings: QuerySettings,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn Embedder>, llm: Arc<dyn Completion>, settings: QuerySettings) -> Self {
        Self {
            embedder,
            llm,
            settings,
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    pub(crate) fn llm(&self) -> &dyn Completion {
        self.llm.as_ref()
    }

    /// Answer `question` from the `corpus` index.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotIndexed`] if `index` is `None`.
    /// - [`RagError::Collaborator`] if embedding, search, or completion fails.
    pub async fn answer(
        &self,
        corpus: Corpus,
        index: Option<&CorpusIndex>,
        question: &str,
    ) -> RagResult<String> {
        let index = index.ok_or(RagError::NotIndexed { corpus })?;

        let query_vec = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| RagError::collaborator("query embedding", e))?;

        let hits = index
            .search(&query_vec, self.settings.top_k)
            .await
            .map_err(|e| RagError::collaborator("similarity search", e))?;

        debug!(
            corpus = corpus.index_name(),
            retrieved = hits.len(),
            top_score = hits.first().map(|h| h.score).unwrap_or_default(),
            "retrieved chunks"
        );

        if hits.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let texts: Vec<String> = hits.into_iter().map(|h| h.chunk.text).collect();
        self.tree_summarize(corpus, question, texts).await
    }

    async fn tree_summarize(
        &self,
        corpus: Corpus,
        question: &str,
        mut texts: Vec<String>,
    ) -> RagResult<String> {
        let mut level = 0usize;
        loop {
            let groups = pack_groups(&texts, self.settings.context_window_chars);
            debug!(level, inputs = texts.len(), groups = groups.len(), "tree summarize level");

            if groups.len() == 1 {
                return self.complete_group(corpus, question, &texts).await;
            }

            let mut partials = Vec::with_capacity(groups.len());
            for range in groups {
                partials.push(self.complete_group(corpus, question, &texts[range]).await?);
            }
            texts = partials;
            level += 1;
        }
    }

    async fn complete_group(&self, corpus: Corpus, question: &str, context: &[String]) -> RagResult<String> {
        let messages = grounding_messages(corpus, question, context);
        self.llm
            .complete(&messages)
            .await
            .map_err(|e| RagError::collaborator("completion", e))
    }
}

/// Greedily pack texts into contiguous groups of at most `budget` chars.
///
/// A text larger than the budget gets a group of its own. Always returns
/// fewer groups than texts when there is more than one text.
fn pack_groups(texts: &[String], budget: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    let mut used = 0usize;
    for (i, t) in texts.iter().enumerate() {
        let len = t.chars().count();
        if i > start && used + len > budget {
            groups.push(start..i);
            start = i;
            used = 0;
        }
        used += len;
    }
    if start < texts.len() {
        groups.push(start..texts.len());
    }

    if texts.len() > 1 && groups.len() == texts.len() {
        return (0..texts.len())
            .step_by(2)
            .map(|i| i..(i + 2).min(texts.len()))
            .collect();
    }
    groups
}
