//! In-memory [`Store`] implementation for testing and WASM targets.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Clarify batch insertion takes the questions write lock once, so the
//! existence check and the insert are atomic with respect to other callers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ChatMessage, ClarifyQuestion, ContextKey, Project, PromptTemplate, QuestionStatus, Role,
};

use super::Store;

#[derive(Default)]
struct QuestionTable {
    batches: HashSet<String>,
    rows: Vec<ClarifyQuestion>,
}

/// In-memory store for tests and embedded use.
pub struct InMemoryStore {
    projects: RwLock<BTreeMap<String, Project>>,
    prompts: RwLock<HashMap<Role, PromptTemplate>>,
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
    questions: RwLock<QuestionTable>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(BTreeMap::new()),
            prompts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            questions: RwLock::new(QuestionTable::default()),
        }
    }

    /// All stored questions, in insertion order.
    pub fn questions(&self) -> Vec<ClarifyQuestion> {
        self.questions.read().unwrap().rows.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        match projects.get_mut(&project.project_name) {
            Some(existing) => existing.merge_from(project.clone()),
            None => {
                projects.insert(project.project_name.clone(), project.clone());
            }
        }
        Ok(())
    }

    async fn get_project(&self, project_name: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().unwrap().get(project_name).cloned())
    }

    async fn list_project_names(&self) -> Result<Vec<String>> {
        Ok(self.projects.read().unwrap().keys().cloned().collect())
    }

    async fn upsert_prompt(&self, template: &PromptTemplate) -> Result<()> {
        self.prompts
            .write()
            .unwrap()
            .insert(template.role, template.clone());
        Ok(())
    }

    async fn get_prompt(&self, role: Role) -> Result<Option<PromptTemplate>> {
        Ok(self.prompts.read().unwrap().get(&role).cloned())
    }

    async fn push_message(&self, session_id: &str, message: &ChatMessage) -> Result<()> {
        self.sessions
            .write()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .sessions
            .read()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_session(&self, session_id: &str) -> Result<u64> {
        Ok(self
            .sessions
            .write()
            .unwrap()
            .remove(session_id)
            .map_or(0, |m| m.len() as u64))
    }

    async fn batch_exists(&self, key: &ContextKey) -> Result<bool> {
        Ok(self.questions.read().unwrap().batches.contains(&key.batch_key()))
    }

    async fn insert_batch_if_absent(
        &self,
        key: &ContextKey,
        questions: &[ClarifyQuestion],
    ) -> Result<bool> {
        let mut table = self.questions.write().unwrap();
        if !table.batches.insert(key.batch_key()) {
            return Ok(false);
        }
        table.rows.extend(questions.iter().cloned());
        Ok(true)
    }

    async fn find_question(
        &self,
        session_id: &str,
        key: &ContextKey,
    ) -> Result<Option<ClarifyQuestion>> {
        Ok(self
            .questions
            .read()
            .unwrap()
            .rows
            .iter()
            .find(|q| q.session_id == session_id && &q.context_key() == key)
            .cloned())
    }

    async fn set_question_status(
        &self,
        session_id: &str,
        status: Option<QuestionStatus>,
    ) -> Result<bool> {
        let mut table = self.questions.write().unwrap();
        match table.rows.iter_mut().find(|q| q.session_id == session_id) {
            Some(q) => {
                q.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(session_id: &str, key: &ContextKey) -> ClarifyQuestion {
        ClarifyQuestion {
            session_id: session_id.to_string(),
            question: format!("Q for {}", session_id),
            project_name: key.project_name.clone(),
            epic_key: key.epic_key.clone(),
            ticket_key: key.ticket_key.clone(),
            url: key.source_url.clone(),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_project_upsert_merges_links() {
        let store = InMemoryStore::new();
        let mut first = Project::new("P");
        first.github_link = vec!["A".into()];
        store.upsert_project(&first).await.unwrap();

        let mut second = Project::new("P");
        second.github_link = vec!["B".into()];
        store.upsert_project(&second).await.unwrap();

        let stored = store.get_project("P").await.unwrap().unwrap();
        assert_eq!(stored.github_link, vec!["A", "B"]);
        assert_eq!(store.list_project_names().await.unwrap(), vec!["P"]);
    }

    #[tokio::test]
    async fn test_batch_insert_is_conditional() {
        let store = InMemoryStore::new();
        let key = ContextKey::new("P", "E").with_ticket("T1");
        assert!(!store.batch_exists(&key).await.unwrap());

        let first = vec![question("s1", &key), question("s2", &key)];
        assert!(store.insert_batch_if_absent(&key, &first).await.unwrap());
        assert!(store.batch_exists(&key).await.unwrap());

        let second = vec![question("s3", &key)];
        assert!(!store.insert_batch_if_absent(&key, &second).await.unwrap());
        assert_eq!(store.questions().len(), 2);
    }

    #[tokio::test]
    async fn test_find_question_requires_matching_context() {
        let store = InMemoryStore::new();
        let key = ContextKey::new("P", "E").with_ticket("T1");
        store
            .insert_batch_if_absent(&key, &[question("s1", &key)])
            .await
            .unwrap();

        assert!(store.find_question("s1", &key).await.unwrap().is_some());
        let other = ContextKey::new("P", "E");
        assert!(store.find_question("s1", &other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_append_and_delete() {
        let store = InMemoryStore::new();
        assert!(store.load_messages("s").await.unwrap().is_empty());

        store.push_message("s", &ChatMessage::human("hi", 1)).await.unwrap();
        store.push_message("s", &ChatMessage::agent("hello", 2)).await.unwrap();
        let history = store.load_messages("s").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");

        assert_eq!(store.delete_session("s").await.unwrap(), 2);
        assert_eq!(store.delete_session("s").await.unwrap(), 0);
    }
}
