use serde::Serialize;
use tracing::info;

use crate::completion::Message;
use crate::error::{HarnessError, HarnessResult};
use crate::models::{ContextKey, Role, Sender};

use super::pipeline::{at_stage, Stage};
use super::{require, validate_key, Engine};

const WORKFLOW: &str = "chat";

/// Stands in for spaces in the incremental transport rendering.
pub const STREAM_DELIMITER: &str = "<|sp|>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub stream: String,
}

/// Re-render a reply for chunked transport: every space becomes
/// [`STREAM_DELIMITER`], so a client can split on it and re-join with
/// spaces.
pub fn render_stream(response: &str) -> String {
    response.replace(' ', STREAM_DELIMITER)
}

impl Engine {
    /// One history-aware chat turn on `session_id`.
    ///
    /// The human message is stored before any model call and the reply
    /// after it. A failed completion therefore leaves an unpaired human
    /// message in the session.
    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        key: ContextKey,
    ) -> HarnessResult<ChatReply> {
        require("sessionID", session_id)?;
        require("message", message)?;
        let key = validate_key(key)?;

        let seed = match self.conversations.get_question(session_id, &key).await {
            Ok(question) => Some(question),
            Err(HarnessError::NotFound(_)) => None,
            Err(e) => return at_stage(WORKFLOW, Stage::ResolvingContext, Err(e)),
        };

        let retriever = self.index_context(WORKFLOW, &key).await?;
        let prompts = at_stage(
            WORKFLOW,
            Stage::Reformulating,
            self.prompts.build(Role::Chat, seed.as_deref()).await,
        )?;

        let history: Vec<Message> = at_stage(
            WORKFLOW,
            Stage::Reformulating,
            self.conversations.load_history(session_id).await,
        )?
        .iter()
        .map(Message::from)
        .collect();

        at_stage(
            WORKFLOW,
            Stage::Persisting,
            self.conversations
                .append_message(session_id, Sender::Human, message, self.tokens.count(message), 0)
                .await,
        )?;

        let generation = self
            .generate(WORKFLOW, &retriever, &prompts, message, &history)
            .await?;

        at_stage(
            WORKFLOW,
            Stage::Persisting,
            self.conversations
                .append_message(
                    session_id,
                    Sender::Agent,
                    &generation.answer,
                    0,
                    self.tokens.count(&generation.answer),
                )
                .await,
        )?;

        info!(
            session_id,
            turns = history.len() / 2 + 1,
            seeded = seed.is_some(),
            query = %generation.query,
            "chat turn complete"
        );
        Ok(ChatReply {
            stream: render_stream(&generation.answer),
            response: generation.answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::completion::MessageRole;

    #[test]
    fn test_render_stream() {
        assert_eq!(render_stream("Hello there you"), "Hello<|sp|>there<|sp|>you");
        assert_eq!(render_stream("one"), "one");
    }

    #[tokio::test]
    async fn test_history_order_across_turns() {
        let (engine, _, completer) = engine(&["q1", "R1", "q2", "R2"]).await;
        engine.chat("s", "M1", key()).await.unwrap();
        let reply = engine.chat("s", "M2 here", key()).await.unwrap();
        assert_eq!(reply.response, "R2");

        let history = engine.session_history("s").await.unwrap();
        let seen: Vec<(Sender, &str)> = history
            .iter()
            .map(|m| (m.sender, m.content.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Sender::Human, "M1"),
                (Sender::Agent, "R1"),
                (Sender::Human, "M2 here"),
                (Sender::Agent, "R2"),
            ]
        );
        assert_eq!(history[0].output_token_count, 0);
        assert_eq!(history[1].input_token_count, 0);
        assert_eq!(history[2].input_token_count, 2);

        // Second turn's answer prompt: system, prior turns, then the new input.
        let prompts = completer.prompts.lock().unwrap();
        let answer = &prompts[3];
        let roles: Vec<MessageRole> = answer.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(answer[3].content, "M2 here");
    }

    #[tokio::test]
    async fn test_seed_question_reaches_answer_prompt() {
        let (engine, store, completer) = engine(&["q", "Which cards?", "q", "ok"]).await;
        engine.generate_clarify_questions(key()).await.unwrap();
        let session_id = store.questions()[0].session_id.clone();

        engine.chat(&session_id, "Visa only", key()).await.unwrap();
        let prompts = completer.prompts.lock().unwrap();
        assert!(prompts[3][0]
            .content
            .contains("This is the question you should ask the user to clarify: Which cards?"));
    }

    #[tokio::test]
    async fn test_failed_completion_leaves_human_message() {
        let (engine, _, _) = engine(&["q"]).await;
        let err = engine.chat("s", "hello", key()).await.unwrap_err();
        assert_eq!(err.code(), "upstream_failure");

        let history = engine.session_history("s").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender, Sender::Human);
    }
}
