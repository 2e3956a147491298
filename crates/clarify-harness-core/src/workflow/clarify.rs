use tracing::info;

use crate::conversation::{new_session_id, BatchInsert};
use crate::error::{HarnessError, HarnessResult};
use crate::models::{ClarifyQuestion, ContextKey, Role};

use super::pipeline::{at_stage, Stage};
use super::{validate_key, Engine};

const WORKFLOW: &str = "clarify";

/// Input handed to the clarify pipeline.
pub const CLARIFY_INSTRUCTION: &str = "List the clarifying questions you would ask about this \
work item before starting on it. Write exactly one question per line. Do not number the \
questions or add any other text.";

pub const ALREADY_EXISTS: &str = "Session already exists";

#[derive(Debug, Clone, PartialEq)]
pub enum ClarifyOutcome {
    /// A new batch was generated and stored.
    Generated {
        response: String,
        questions: Vec<ClarifyQuestion>,
    },
    /// The context already had a batch; nothing was generated or written.
    AlreadyExists,
}

impl ClarifyOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ClarifyOutcome::Generated { .. } => "Questions generated",
            ClarifyOutcome::AlreadyExists => ALREADY_EXISTS,
        }
    }
}

/// Split a model response into one question record per non-blank line,
/// each under a freshly minted session ID.
pub fn format_questions(response: &str, key: &ContextKey) -> Vec<ClarifyQuestion> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ClarifyQuestion {
            session_id: new_session_id(),
            question: line.to_string(),
            project_name: key.project_name.clone(),
            epic_key: key.epic_key.clone(),
            ticket_key: key.ticket_key.clone(),
            url: key.source_url.clone(),
            status: None,
        })
        .collect()
}

impl Engine {
    /// Generate and store the clarifying questions for `key`, at most once
    /// per context.
    pub async fn generate_clarify_questions(&self, key: ContextKey) -> HarnessResult<ClarifyOutcome> {
        let key = validate_key(key)?;

        if at_stage(
            WORKFLOW,
            Stage::ResolvingContext,
            self.conversations.has_existing_batch(&key).await,
        )? {
            info!(context = %key, "clarify batch already exists");
            return Ok(ClarifyOutcome::AlreadyExists);
        }

        let retriever = self.index_context(WORKFLOW, &key).await?;
        let prompts = at_stage(
            WORKFLOW,
            Stage::Reformulating,
            self.prompts.build(Role::Clarify, None).await,
        )?;
        let generation = self
            .generate(WORKFLOW, &retriever, &prompts, CLARIFY_INSTRUCTION, &[])
            .await?;

        let questions = format_questions(&generation.answer, &key);
        if questions.is_empty() {
            return at_stage(
                WORKFLOW,
                Stage::Generating,
                Err(HarnessError::UpstreamFailure(
                    "model returned no questions".to_string(),
                )),
            );
        }

        let insert = at_stage(
            WORKFLOW,
            Stage::Persisting,
            self.conversations.insert_clarify_batch(&key, &questions).await,
        )?;
        match insert {
            BatchInsert::Inserted => {
                info!(
                    context = %key,
                    questions = questions.len(),
                    query = %generation.query,
                    "generated clarify questions"
                );
                Ok(ClarifyOutcome::Generated {
                    response: generation.answer,
                    questions,
                })
            }
            BatchInsert::AlreadyExists => {
                info!(context = %key, "concurrent clarify batch won; discarding ours");
                Ok(ClarifyOutcome::AlreadyExists)
            }
        }
    }
}
