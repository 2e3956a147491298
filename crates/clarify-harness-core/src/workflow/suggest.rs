use serde::Serialize;
use tracing::info;

use crate::error::HarnessResult;
use crate::models::{ContextKey, Role};

use super::pipeline::{at_stage, Stage};
use super::{require, validate_key, Engine};

const WORKFLOW: &str = "suggest";

/// Reply the model gives when no candidate answer applies.
pub const NO_SUGGESTIONS: &str = "no suggestions";

pub const SUGGEST_INSTRUCTION: &str = "Suggest candidate answers to the clarifying question \
below using only the provided context. Separate candidates with the '|' character. If there \
is exactly one candidate, end it with a trailing '|'. If no candidate applies, reply with \
exactly: no suggestions";

/// Candidate answers for one stored question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub question: String,
    pub candidates: Vec<String>,
}

/// Parse a pipe-delimited reply. `None` means no suggestions.
pub fn parse_suggestions(response: &str) -> Option<Vec<String>> {
    let response = response.trim();
    if response.eq_ignore_ascii_case(NO_SUGGESTIONS) {
        return None;
    }
    let candidates: Vec<String> = response
        .split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if candidates.is_empty() {
        None
    } else {
        Some(candidates)
    }
}

impl Engine {
    /// Suggest answers for the question stored under `session_id`.
    pub async fn generate_suggestion(
        &self,
        session_id: &str,
        key: ContextKey,
    ) -> HarnessResult<Option<Suggestion>> {
        require("sessionID", session_id)?;
        let key = validate_key(key)?;

        let question = at_stage(
            WORKFLOW,
            Stage::ResolvingContext,
            self.conversations.get_question(session_id, &key).await,
        )?;

        let retriever = self.index_context(WORKFLOW, &key).await?;
        let prompts = at_stage(
            WORKFLOW,
            Stage::Reformulating,
            self.prompts.build(Role::Suggestion, None).await,
        )?;
        let input = format!("{}\nQuestion: {}", SUGGEST_INSTRUCTION, question);
        let generation = self.generate(WORKFLOW, &retriever, &prompts, &input, &[]).await?;

        let suggestion = parse_suggestions(&generation.answer).map(|candidates| Suggestion {
            question,
            candidates,
        });
        info!(
            session_id,
            query = %generation.query,
            candidates = suggestion.as_ref().map_or(0, |s| s.candidates.len()),
            "generated suggestion"
        );
        Ok(suggestion)
    }
}
