//! Workflow engine: the clarify, suggest and chat flows.
//!
//! All three flows share one shape:
//!
//! ```text
//! Idle → ResolvingContext → Indexing → Reformulating → Retrieving
//!      → Generating → Persisting → Done
//! ```
//!
//! with a single `Failed` terminal. The corpus for the [`ContextKey`] is
//! chunked and embedded into a fresh retriever, the role's prompt pair is
//! assembled, the reformulation prompt turns the input into a retrieval
//! query, and the answer prompt receives the top-k chunks. The flows
//! differ only in history handling, output parsing and what they persist.
//!
//! No stage retries. The first collaborator failure ends the run and is
//! returned as a [`HarnessError`].

mod chat;
mod clarify;
mod pipeline;
mod suggest;

pub use chat::{render_stream, ChatReply, STREAM_DELIMITER};
pub use clarify::{format_questions, ClarifyOutcome, ALREADY_EXISTS, CLARIFY_INSTRUCTION};
pub use pipeline::Stage;
pub use suggest::{parse_suggestions, Suggestion, NO_SUGGESTIONS, SUGGEST_INSTRUCTION};

use std::sync::Arc;

use crate::catalog::ProjectCatalog;
use crate::completion::CompletionProvider;
use crate::conversation::ConversationStore;
use crate::corpus::CorpusLoader;
use crate::embedding::EmbeddingProvider;
use crate::error::{HarnessError, HarnessResult};
use crate::models::{ChatMessage, ContextKey, PromptTemplate, QuestionStatus, Role};
use crate::prompt::PromptAssembler;
use crate::retriever::RetrievalParams;
use crate::store::Store;
use crate::tokens::{HeuristicTokenCounter, TokenCounter};

/// Entry point for every workflow and its supporting operations.
///
/// All collaborators are passed in explicitly, so tests can substitute
/// in-memory stores and fake providers.
pub struct Engine {
    corpus: CorpusLoader,
    prompts: PromptAssembler,
    conversations: ConversationStore,
    catalog: ProjectCatalog,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    tokens: Arc<dyn TokenCounter>,
    params: RetrievalParams,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            corpus: CorpusLoader::new(store.clone()),
            prompts: PromptAssembler::new(store.clone()),
            conversations: ConversationStore::new(store.clone()),
            catalog: ProjectCatalog::new(store),
            embedder,
            completer,
            tokens: Arc::new(HeuristicTokenCounter),
            params: RetrievalParams::default(),
        }
    }

    pub fn with_token_counter(mut self, tokens: Arc<dyn TokenCounter>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub fn catalog(&self) -> &ProjectCatalog {
        &self.catalog
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Create or overwrite the template for `role`.
    pub async fn set_prompt_template(
        &self,
        role: Role,
        contextualize_q_system_prompt: &str,
        qa_system_prompt: &str,
    ) -> HarnessResult<()> {
        self.prompts
            .save_template(&PromptTemplate {
                role,
                contextualize_q_system_prompt: contextualize_q_system_prompt.to_string(),
                qa_system_prompt: qa_system_prompt.to_string(),
            })
            .await
    }

    pub async fn get_prompt_template(&self, role: Role) -> HarnessResult<PromptTemplate> {
        self.prompts.template(role).await
    }

    pub async fn delete_session(&self, session_id: &str) -> HarnessResult<()> {
        require("sessionID", session_id)?;
        self.conversations.delete_session(session_id).await
    }

    pub async fn session_history(&self, session_id: &str) -> HarnessResult<Vec<ChatMessage>> {
        require("sessionID", session_id)?;
        self.conversations.load_history(session_id).await
    }

    /// Set or clear the review status of one generated question.
    pub async fn mark_question_status(
        &self,
        session_id: &str,
        status: Option<QuestionStatus>,
    ) -> HarnessResult<()> {
        require("sessionID", session_id)?;
        self.conversations.set_question_status(session_id, status).await
    }
}

fn require(field: &str, value: &str) -> HarnessResult<()> {
    if value.trim().is_empty() {
        return Err(HarnessError::invalid_input(format!("{} is required", field)));
    }
    Ok(())
}

/// Normalize a context key and check the fields every workflow needs.
fn validate_key(key: ContextKey) -> HarnessResult<ContextKey> {
    let key = key.normalized();
    require("project_name", &key.project_name)?;
    require("epic_key", &key.epic_key)?;
    if key.ticket_key.is_none() && key.source_url.is_none() {
        return Err(HarnessError::invalid_input(
            "either ticket_key or url is required to select a context",
        ));
    }
    Ok(key)
}
