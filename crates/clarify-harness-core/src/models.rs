//! Core data models used throughout Clarify Harness.
//!
//! These types describe the grounding corpus (projects, epics, tickets and
//! their linked pages), the persisted prompt templates, and the
//! conversation artifacts (chat messages and generated clarify questions)
//! that flow through the workflow engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============ Context ============

/// Identifies exactly one grounding corpus.
///
/// `ticket_key` selects a ticket's description; `source_url` selects one
/// page linked from the epic. When both are set the ticket wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextKey {
    pub project_name: String,
    pub epic_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_key: Option<String>,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ContextKey {
    pub fn new(project_name: impl Into<String>, epic_key: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            epic_key: epic_key.into(),
            ticket_key: None,
            source_url: None,
        }
    }

    pub fn with_ticket(mut self, ticket_key: impl Into<String>) -> Self {
        self.ticket_key = Some(ticket_key.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Treat empty strings coming from forms or query strings as absent.
    pub fn normalized(mut self) -> Self {
        self.ticket_key = self.ticket_key.filter(|t| !t.trim().is_empty());
        self.source_url = self.source_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Stable digest of the full tuple, used as the clarify batch key.
    ///
    /// Fields are joined with a unit separator so that `("a", "bc")` and
    /// `("ab", "c")` never collide.
    pub fn batch_key(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.project_name.as_str(),
            self.epic_key.as_str(),
            self.ticket_key.as_deref().unwrap_or(""),
            self.source_url.as_deref().unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_name, self.epic_key)?;
        if let Some(ticket) = &self.ticket_key {
            write!(f, "/{}", ticket)?;
        }
        if let Some(url) = &self.source_url {
            write!(f, " <{}>", url)?;
        }
        Ok(())
    }
}

/// A titled block of grounding text, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// The text that gets chunked and embedded.
    pub fn render(&self) -> String {
        format!("Title: {}\nContent: {}", self.title, self.content)
    }
}

/// A bounded slice of a rendered [`Document`].
///
/// `start` and `end` are char offsets into the rendered text, so
/// consecutive chunks can be de-overlapped exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub title: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

// ============ Prompts ============

/// Selects the prompt template and workflow behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Clarify,
    Chat,
    Suggestion,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Clarify, Role::Chat, Role::Suggestion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Clarify => "CLARIFY",
            Role::Chat => "CHAT",
            Role::Suggestion => "SUGGESTION",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLARIFY" => Ok(Role::Clarify),
            "CHAT" => Ok(Role::Chat),
            "SUGGESTION" => Ok(Role::Suggestion),
            other => Err(format!(
                "unknown role '{}': expected CLARIFY, CHAT or SUGGESTION",
                other
            )),
        }
    }
}

/// Persisted system prompts for one [`Role`]. Exactly one per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub role: Role,
    pub contextualize_q_system_prompt: String,
    pub qa_system_prompt: String,
}

// ============ Conversation ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Human,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Human => "human",
            Sender::Agent => "agent",
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Sender::Human),
            "agent" => Ok(Sender::Agent),
            other => Err(format!("unknown sender '{}'", other)),
        }
    }
}

/// One turn of a session. Human turns carry only input tokens, agent
/// turns only output tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    pub input_token_count: i64,
    pub output_token_count: i64,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>, input_tokens: i64) -> Self {
        Self {
            sender: Sender::Human,
            content: content.into(),
            input_token_count: input_tokens,
            output_token_count: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn agent(content: impl Into<String>, output_tokens: i64) -> Self {
        Self {
            sender: Sender::Agent,
            content: content.into(),
            input_token_count: 0,
            output_token_count: output_tokens,
            timestamp: Utc::now(),
        }
    }
}

/// Review state of a generated question. `None` on the record means the
/// question is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Resolved,
    Dismissed,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Resolved => "resolved",
            QuestionStatus::Dismissed => "dismissed",
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resolved" => Ok(QuestionStatus::Resolved),
            "dismissed" => Ok(QuestionStatus::Dismissed),
            other => Err(format!(
                "unknown question status '{}': expected resolved or dismissed",
                other
            )),
        }
    }
}

/// One generated clarifying question. Its `session_id` identifies the
/// question itself and is reused as the chat session about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyQuestion {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub question: String,
    pub project_name: String,
    pub epic_key: String,
    pub ticket_key: Option<String>,
    pub url: Option<String>,
    pub status: Option<QuestionStatus>,
}

impl ClarifyQuestion {
    pub fn context_key(&self) -> ContextKey {
        ContextKey {
            project_name: self.project_name.clone(),
            epic_key: self.epic_key.clone(),
            ticket_key: self.ticket_key.clone(),
            source_url: self.url.clone(),
        }
    }
}

// ============ Projects ============

/// A page captured from an external source (Confluence, Google Docs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPage {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Externally linked material, classified by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSources {
    #[serde(default)]
    pub confluence: Vec<LinkedPage>,
    #[serde(default, rename = "googleDocs")]
    pub google_docs: Vec<LinkedPage>,
    #[serde(default, rename = "otherLinks")]
    pub other_links: Vec<String>,
}

/// A task, story or bug under an epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_task_type")]
    pub issue_type: String,
    #[serde(default)]
    pub source: LinkedSources,
}

fn default_task_type() -> String {
    "Task".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub source: LinkedSources,
}

impl Epic {
    pub fn task(&self, key: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.key == key)
    }
}

/// Nested project aggregate keyed by `project_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_name: String,
    #[serde(default)]
    pub github_link: Vec<String>,
    #[serde(default)]
    pub jira_link: Vec<String>,
    #[serde(default)]
    pub docs_link: Vec<String>,
    #[serde(default)]
    pub confluence_link: Vec<String>,
    #[serde(default)]
    pub issues: Vec<Epic>,
}

impl Project {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            github_link: Vec::new(),
            jira_link: Vec::new(),
            docs_link: Vec::new(),
            confluence_link: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn epic(&self, key: &str) -> Option<&Epic> {
        self.issues.iter().find(|e| e.key == key)
    }

    /// Fold a re-ingested record into this one.
    ///
    /// Link lists grow by concatenation; every other field is replaced by
    /// the incoming value.
    pub fn merge_from(&mut self, incoming: Project) {
        self.github_link.extend(incoming.github_link);
        self.jira_link.extend(incoming.jira_link);
        self.docs_link.extend(incoming.docs_link);
        self.confluence_link.extend(incoming.confluence_link);
        self.issues = incoming.issues;
    }
}
