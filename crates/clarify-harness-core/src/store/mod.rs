//! Storage abstraction for Clarify Harness.
//!
//! The [`Store`] trait is the persistence collaborator: a key-structured
//! read/write/merge API over four logical collections. Sessions and
//! clarify questions are separate collections with their own schemas.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChatMessage, ClarifyQuestion, ContextKey, Project, PromptTemplate, QuestionStatus, Role};

/// Abstract storage backend for Clarify Harness.
///
/// # Operations
///
/// | Method | Collection | Purpose |
/// |--------|------------|---------|
/// | [`upsert_project`](Store::upsert_project) | projects | Insert, or merge into the existing record |
/// | [`get_project`](Store::get_project) | projects | Point read by `project_name` |
/// | [`list_project_names`](Store::list_project_names) | projects | All project keys, sorted |
/// | [`upsert_prompt`](Store::upsert_prompt) | prompts | Create or overwrite the role's template |
/// | [`get_prompt`](Store::get_prompt) | prompts | Point read by role |
/// | [`push_message`](Store::push_message) | sessions | Append, creating the session if absent |
/// | [`load_messages`](Store::load_messages) | sessions | Ordered history; empty if absent |
/// | [`delete_session`](Store::delete_session) | sessions | Remove a session's messages |
/// | [`batch_exists`](Store::batch_exists) | questions | Has this context already been clarified? |
/// | [`insert_batch_if_absent`](Store::insert_batch_if_absent) | questions | Atomic all-or-nothing batch insert |
/// | [`find_question`](Store::find_question) | questions | Point read by session and context |
/// | [`set_question_status`](Store::set_question_status) | questions | Point update |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a project, or merge it into the stored record with
    /// [`Project::merge_from`] semantics.
    async fn upsert_project(&self, project: &Project) -> Result<()>;

    async fn get_project(&self, project_name: &str) -> Result<Option<Project>>;

    async fn list_project_names(&self) -> Result<Vec<String>>;

    async fn upsert_prompt(&self, template: &PromptTemplate) -> Result<()>;

    async fn get_prompt(&self, role: Role) -> Result<Option<PromptTemplate>>;

    async fn push_message(&self, session_id: &str, message: &ChatMessage) -> Result<()>;

    /// Messages in insertion order. A missing session yields an empty list.
    async fn load_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// Returns the number of messages removed (0 if the session was absent).
    async fn delete_session(&self, session_id: &str) -> Result<u64>;

    async fn batch_exists(&self, key: &ContextKey) -> Result<bool>;

    /// Insert every question of a batch, but only if no batch exists for
    /// `key`. Returns `false` (and writes nothing) when one already does.
    /// Either all questions are stored or none are.
    async fn insert_batch_if_absent(
        &self,
        key: &ContextKey,
        questions: &[ClarifyQuestion],
    ) -> Result<bool>;

    async fn find_question(
        &self,
        session_id: &str,
        key: &ContextKey,
    ) -> Result<Option<ClarifyQuestion>>;

    /// Returns `false` if no question has this session ID.
    async fn set_question_status(
        &self,
        session_id: &str,
        status: Option<QuestionStatus>,
    ) -> Result<bool>;
}
