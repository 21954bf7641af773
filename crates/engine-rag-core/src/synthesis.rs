//! Cross-corpus synthesis.
//!
//! [`Synthesizer::answer_both`] runs a strict three-step protocol:
//!
//! 1. answer the question from the instrumentation index,
//! 2. answer the same question from the code index,
//! 3. issue one completion call that reconciles both answers.
//!
//! The two retrievals never see each other's context; they only meet in
//! the final prompt, where both answers appear labeled by source.

use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{RagError, RagResult};
use crate::index::CorpusIndex;
use crate::llm::ChatMessage;
use crate::models::Corpus;
use crate::query::QueryEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    Ready,
    Synthesizing,
}

/// The intermediate and final answers of one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAnswer {
    pub instrumentation: String,
    pub code: String,
    pub merged: String,
}

/// Build the reconciliation prompt from both per-corpus answers.
pub fn synthesis_messages(question: &str, instrumentation: &str, code: &str) -> Vec<ChatMessage> {
    let prompt = format!(
        "I have information from two sources about a matching engine:\n\n\
1. From the execution instrumentation log:\n{instrumentation}\n\n\
2. From the source code:\n{code}\n\n\
Based on both sources, provide a comprehensive answer to: {question}\n\n\
Synthesize the information from both the runtime execution data and the code implementation. \
Explain why the code produced what the log shows happened. Where the same identifiers \
(function names, function UUIDs, order ids) appear in both sources, cross-reference them explicitly. \
If the two sources disagree, say so."
    );
    vec![ChatMessage::user(prompt)]
}

/// Coordinates both corpus answers and the final reasoning pass.
pub struct Synthesizer<'a> {
    engine: &'a QueryEngine,
    state: Mutex<SynthesisState>,
}

/// Holds the synthesizer in `Synthesizing`; dropping it returns to `Ready`
/// whether the run succeeded, failed, or was cancelled.
struct Running<'s> {
    state: &'s Mutex<SynthesisState>,
}

impl<'s> Running<'s> {
    fn enter(state: &'s Mutex<SynthesisState>) -> Self {
        set_state(state, SynthesisState::Synthesizing);
        Self { state }
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        set_state(self.state, SynthesisState::Ready);
    }
}

fn set_state(state: &Mutex<SynthesisState>, next: SynthesisState) {
    let mut current = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    debug!(from = ?*current, to = ?next, "synthesis state");
    *current = next;
}

impl<'a> Synthesizer<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self {
            engine,
            state: Mutex::new(SynthesisState::Ready),
        }
    }

    pub fn state(&self) -> SynthesisState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer `question` from both corpora and reconcile the results.
    ///
    /// Both indices must exist before any collaborator is called.
    pub async fn answer_both(
        &self,
        instrumentation: Option<&CorpusIndex>,
        code: Option<&CorpusIndex>,
        question: &str,
    ) -> RagResult<SynthesizedAnswer> {
        let instrumentation = instrumentation.ok_or(RagError::NotIndexed {
            corpus: Corpus::Instrumentation,
        })?;
        let code = code.ok_or(RagError::NotIndexed { corpus: Corpus::Code })?;

        let _running = Running::enter(&self.state);

        info!("querying instrumentation log");
        let instr_answer = self
            .engine
            .answer(Corpus::Instrumentation, Some(instrumentation), question)
            .await?;

        info!("querying source code");
        let code_answer = self
            .engine
            .answer(Corpus::Code, Some(code), question)
            .await?;

        let messages = synthesis_messages(question, &instr_answer, &code_answer);
        let merged = self
            .engine
            .llm()
            .complete(&messages)
            .await
            .map_err(|e| RagError::collaborator("synthesis", e))?;

        Ok(SynthesizedAnswer {
            instrumentation: instr_answer,
            code: code_answer,
            merged,
        })
    }
}
