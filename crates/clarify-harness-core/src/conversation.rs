//! Conversation state: chat sessions and generated clarify questions.
//!
//! [`ConversationStore`] is the typed contract the workflows use on top
//! of the raw [`Store`]. It maps every store failure to
//! [`HarnessError::DataUnavailable`] and owns session ID minting.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{HarnessError, HarnessResult};
use crate::models::{ChatMessage, ClarifyQuestion, ContextKey, QuestionStatus, Sender};
use crate::store::Store;

/// Mint a session ID: `DDMMYYYY-HHMMSS-<8 hex chars>` (UTC).
pub fn new_session_id() -> String {
    let stamp = Utc::now().format("%d%m%Y-%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", stamp, &suffix[..8])
}

/// Outcome of a conditional batch insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchInsert {
    Inserted,
    AlreadyExists,
}

pub struct ConversationStore {
    store: Arc<dyn Store>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append to a session, creating it on first use.
    pub async fn append_message(
        &self,
        session_id: &str,
        sender: Sender,
        content: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> HarnessResult<ChatMessage> {
        let message = ChatMessage {
            sender,
            content: content.to_string(),
            input_token_count: input_tokens,
            output_token_count: output_tokens,
            timestamp: Utc::now(),
        };
        self.store
            .push_message(session_id, &message)
            .await
            .map_err(HarnessError::data_unavailable)?;
        debug!(session_id, sender = sender.as_str(), "appended message");
        Ok(message)
    }

    /// Ordered history; a missing session is an empty history.
    pub async fn load_history(&self, session_id: &str) -> HarnessResult<Vec<ChatMessage>> {
        self.store
            .load_messages(session_id)
            .await
            .map_err(HarnessError::data_unavailable)
    }

    /// Idempotent: deleting an absent session succeeds.
    pub async fn delete_session(&self, session_id: &str) -> HarnessResult<()> {
        let removed = self
            .store
            .delete_session(session_id)
            .await
            .map_err(HarnessError::data_unavailable)?;
        info!(session_id, removed, "deleted session");
        Ok(())
    }

    pub async fn has_existing_batch(&self, key: &ContextKey) -> HarnessResult<bool> {
        self.store
            .batch_exists(key)
            .await
            .map_err(HarnessError::data_unavailable)
    }

    /// Store a whole batch atomically, unless the context already has one.
    pub async fn insert_clarify_batch(
        &self,
        key: &ContextKey,
        questions: &[ClarifyQuestion],
    ) -> HarnessResult<BatchInsert> {
        let inserted = self
            .store
            .insert_batch_if_absent(key, questions)
            .await
            .map_err(HarnessError::data_unavailable)?;
        if inserted {
            info!(context = %key, count = questions.len(), "stored clarify batch");
            Ok(BatchInsert::Inserted)
        } else {
            Ok(BatchInsert::AlreadyExists)
        }
    }

    pub async fn get_question(&self, session_id: &str, key: &ContextKey) -> HarnessResult<String> {
        self.store
            .find_question(session_id, key)
            .await
            .map_err(HarnessError::data_unavailable)?
            .map(|q| q.question)
            .ok_or_else(|| HarnessError::not_found(format!("question for session '{}'", session_id)))
    }

    pub async fn set_question_status(
        &self,
        session_id: &str,
        status: Option<QuestionStatus>,
    ) -> HarnessResult<()> {
        let updated = self
            .store
            .set_question_status(session_id, status)
            .await
            .map_err(HarnessError::data_unavailable)?;
        if !updated {
            return Err(HarnessError::not_found(format!(
                "question for session '{}'",
                session_id
            )));
        }
        Ok(())
    }
}
