//! Retrieve → Prompt → LLM → Answer.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use super::history::{ChatTurn, Conversation};
use super::prompt::PromptTemplate;
use super::retriever::{RetrievalError, Retriever};
use crate::config::{ChainType, ConfigError, Settings};
use crate::llm::{ChatMessage, GenerationParams, LanguageModel, LlmError};
use crate::logging::record;

/// Shown instead of a source list when retrieval found nothing.
pub const NO_SOURCES_MARKER: &str = "Sources: none (no matching documents)";

/// Errors for a single turn. None of these end a session.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("retrieval task failed: {0}")]
    Task(String),
}

/// One parameterised query pipeline for both chain types.
pub struct QueryPipeline {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    params: GenerationParams,
    chain: ChainType,
    top_k: usize,
    context_budget: usize,
    show_sources: bool,
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("llm", &self.llm.name())
            .field("chain", &self.chain)
            .field("top_k", &self.top_k)
            .field("params", &self.params)
            .finish()
    }
}

impl QueryPipeline {
    pub fn from_settings(
        settings: &Settings,
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self, ConfigError> {
        let model = settings.active_model()?;
        Ok(Self {
            retriever,
            llm,
            template: PromptTemplate::new(settings.prompt.template.clone())?,
            params: GenerationParams::from(model),
            chain: settings.chain_type()?,
            top_k: settings.similarity_search.top_k,
            context_budget: model.context_budget_chars(),
            show_sources: settings.metadata.show_source_in_response,
        })
    }

    pub fn chain_type(&self) -> ChainType {
        self.chain
    }

    /// Answer one question.
    ///
    /// In conversational mode prior turns are sent to the model and the new
    /// turn is appended to `conversation` on success. A failed turn leaves
    /// the conversation untouched.
    pub async fn ask(
        &self,
        question: &str,
        conversation: &mut Conversation,
    ) -> Result<ChatTurn, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let started = Instant::now();
        tracing::info!(target: "query", "{}", record::question(question));

        let result = self.answer(question, conversation, started).await;
        match &result {
            Ok(turn) => {
                tracing::info!(target: "query", "{}", record::answer(&turn.answer));
                tracing::info!(target: "query", "{}", record::sources(&turn.sources));
                tracing::info!(target: "query", "{}", record::inference_time(turn.latency));
                if self.chain == ChainType::Conversational {
                    conversation.push(turn.clone());
                }
            }
            Err(e) => {
                tracing::error!(target: "query", "query failed: {e}");
                tracing::info!(target: "query", "{}", record::failed_after(started.elapsed()));
            }
        }

        result
    }

    async fn answer(
        &self,
        question: &str,
        conversation: &Conversation,
        started: Instant,
    ) -> Result<ChatTurn, QueryError> {
        let retriever = Arc::clone(&self.retriever);
        let owned_question = question.to_string();
        let top_k = self.top_k;
        let chunks = tokio::task::spawn_blocking(move || retriever.retrieve(&owned_question, top_k))
            .await
            .map_err(|e| QueryError::Task(e.to_string()))??;

        if chunks.is_empty() {
            tracing::warn!(target: "query", "{}", record::no_sources(question));
        }
        for scored in &chunks {
            crate::debug_event!(
                "query",
                "retrieved",
                "{:.3} {} {}",
                scored.score,
                scored.source(),
                scored.chunk.preview(60)
            );
        }

        // History may take at most half the budget; context gets the rest
        let history = match self.chain {
            ChainType::Conversational => conversation.recent_messages(self.context_budget / 2),
            ChainType::RetrievalQa => Vec::new(),
        };
        if history.len() < conversation.len() * 2 {
            crate::debug_event!(
                "query",
                "history trimmed",
                "{} of {} turns sent",
                history.len() / 2,
                conversation.len()
            );
        }

        let history_chars: usize = history.iter().map(|m| m.content.chars().count()).sum();
        let fixed_chars = self.template.as_str().chars().count() + question.chars().count();
        let context_budget = self
            .context_budget
            .saturating_sub(history_chars + fixed_chars);

        let prompt = self.template.render(question, &chunks, context_budget);
        if prompt.chunks_used < chunks.len() {
            crate::debug_event!(
                "query",
                "context trimmed",
                "{} of {} chunks fit",
                prompt.chunks_used,
                chunks.len()
            );
        }

        let mut messages = history;
        messages.push(ChatMessage::user(prompt.text));

        let answer = self.llm.complete(&messages, &self.params).await?;

        let sources: BTreeSet<String> = chunks[..prompt.chunks_used]
            .iter()
            .map(|scored| scored.source())
            .collect();

        Ok(ChatTurn {
            question: question.to_string(),
            answer,
            sources,
            latency: started.elapsed(),
        })
    }

    /// User-facing text for a turn.
    ///
    /// The no-source marker is always shown; the source list only when
    /// `metadata.show_source_in_response` is set.
    pub fn render_answer(&self, turn: &ChatTurn) -> String {
        render_answer(turn, self.show_sources)
    }
}

pub fn render_answer(turn: &ChatTurn, show_sources: bool) -> String {
    if turn.sources.is_empty() {
        format!("{}\n\n{NO_SOURCES_MARKER}", turn.answer)
    } else if show_sources {
        let list = turn.sources.iter().cloned().collect::<Vec<_>>().join(", ");
        format!("{}\n\nSources: {list}", turn.answer)
    } else {
        turn.answer.clone()
    }
}
