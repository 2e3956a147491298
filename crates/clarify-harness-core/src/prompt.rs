//! Prompt assembly per workflow [`Role`].
//!
//! Every workflow needs two prompts: a *reformulation* prompt that turns
//! the input (plus history, for chat) into a standalone retrieval query,
//! and an *answer* prompt that receives the retrieved context. Both are
//! built from the persisted [`PromptTemplate`] for the role.
//!
//! Prompts are templates until [`ChatPrompt::bind`] fills in the three
//! slots: retrieved `context`, the human `input`, and the prior turns.
//! Stored prompt text is always literal; only the explicit slots are
//! substituted.
//!
//! | Role | Reformulate | Answer |
//! |------|-------------|--------|
//! | `CHAT` | system, history, human | system + seed question + context, history, human |
//! | `CLARIFY`, `SUGGESTION` | system, human | system + context, human |

use std::sync::Arc;

use crate::completion::Message;
use crate::error::{HarnessError, HarnessResult};
use crate::models::{PromptTemplate, Role};
use crate::store::Store;

/// A piece of system prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Context,
}

/// One position in a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    System(Vec<Segment>),
    /// Placeholder expanded into the ordered prior turns.
    History,
    /// The human turn carrying the workflow input.
    Human,
}

/// An unbound chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    parts: Vec<PromptPart>,
}

/// Values bound into a [`ChatPrompt`] at invocation time.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub input: &'a str,
    pub context: &'a str,
    pub history: &'a [Message],
}

impl ChatPrompt {
    pub fn new(parts: Vec<PromptPart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    pub fn has_history(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, PromptPart::History))
    }

    /// Produce the concrete message list for the completion provider.
    pub fn bind(&self, bindings: &Bindings<'_>) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.parts.len() + bindings.history.len());
        for part in &self.parts {
            match part {
                PromptPart::System(segments) => {
                    let text: String = segments
                        .iter()
                        .map(|s| match s {
                            Segment::Text(t) => t.as_str(),
                            Segment::Context => bindings.context,
                        })
                        .collect();
                    out.push(Message::system(text));
                }
                PromptPart::History => out.extend(bindings.history.iter().cloned()),
                PromptPart::Human => out.push(Message::user(bindings.input)),
            }
        }
        out
    }
}

/// The two prompts a workflow runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub reformulate: ChatPrompt,
    pub answer: ChatPrompt,
}

/// Build the prompt pair for `role` from its stored template.
///
/// `seed_question` is only used by [`Role::Chat`].
pub fn assemble(role: Role, template: &PromptTemplate, seed_question: Option<&str>) -> PromptPair {
    match role {
        Role::Chat => chat_prompts(template, seed_question),
        Role::Clarify | Role::Suggestion => single_turn_prompts(template),
    }
}

fn chat_prompts(template: &PromptTemplate, seed_question: Option<&str>) -> PromptPair {
    let mut answer_system = vec![Segment::Text(template.qa_system_prompt.clone())];
    if let Some(seed) = seed_question {
        answer_system.push(Segment::Text(format!(
            "\nThis is the question you should ask the user to clarify: {}",
            seed
        )));
    }
    answer_system.push(Segment::Text("\n\n".to_string()));
    answer_system.push(Segment::Context);

    PromptPair {
        reformulate: ChatPrompt::new(vec![
            PromptPart::System(vec![Segment::Text(
                template.contextualize_q_system_prompt.clone(),
            )]),
            PromptPart::History,
            PromptPart::Human,
        ]),
        answer: ChatPrompt::new(vec![
            PromptPart::System(answer_system),
            PromptPart::History,
            PromptPart::Human,
        ]),
    }
}

fn single_turn_prompts(template: &PromptTemplate) -> PromptPair {
    PromptPair {
        reformulate: ChatPrompt::new(vec![
            PromptPart::System(vec![Segment::Text(
                template.contextualize_q_system_prompt.clone(),
            )]),
            PromptPart::Human,
        ]),
        answer: ChatPrompt::new(vec![
            PromptPart::System(vec![
                Segment::Text(template.qa_system_prompt.clone()),
                Segment::Text("\n\n".to_string()),
                Segment::Context,
            ]),
            PromptPart::Human,
        ]),
    }
}

/// Loads and saves [`PromptTemplate`]s and assembles prompt pairs.
pub struct PromptAssembler {
    store: Arc<dyn Store>,
}

impl PromptAssembler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetch the template for `role`. Templates must be seeded before any
    /// workflow of that role runs.
    pub async fn template(&self, role: Role) -> HarnessResult<PromptTemplate> {
        self.store
            .get_prompt(role)
            .await
            .map_err(HarnessError::data_unavailable)?
            .ok_or_else(|| HarnessError::not_found(format!("prompt template for role {}", role)))
    }

    /// Create the template for its role, or overwrite its fields.
    pub async fn save_template(&self, template: &PromptTemplate) -> HarnessResult<()> {
        if template.contextualize_q_system_prompt.trim().is_empty()
            || template.qa_system_prompt.trim().is_empty()
        {
            return Err(HarnessError::invalid_input(
                "contextualize_q_system_prompt and qa_system_prompt must not be empty",
            ));
        }
        self.store
            .upsert_prompt(template)
            .await
            .map_err(HarnessError::data_unavailable)
    }

    pub async fn build(&self, role: Role, seed_question: Option<&str>) -> HarnessResult<PromptPair> {
        let template = self.template(role).await?;
        Ok(assemble(role, &template, seed_question))
    }
}
