//! The two-stage retrieval pipeline shared by every workflow.

use std::fmt;

use tracing::{debug, warn};

use crate::completion::Message;
use crate::error::{HarnessError, HarnessResult};
use crate::models::ContextKey;
use crate::prompt::{Bindings, PromptPair};
use crate::retriever::{build_retriever, format_context, Retriever};

use super::Engine;

/// Workflow progress, used to tag logs and failures.
///
/// Only the active stages are variants. A workflow is idle until its
/// engine method is called, done when that method returns `Ok`, and
/// failed when it returns `Err`; [`at_stage`] records which stage the
/// failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingContext,
    Indexing,
    Reformulating,
    Retrieving,
    Generating,
    Persisting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ResolvingContext => "resolving_context",
            Stage::Indexing => "indexing",
            Stage::Reformulating => "reformulating",
            Stage::Retrieving => "retrieving",
            Stage::Generating => "generating",
            Stage::Persisting => "persisting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log a stage failure and pass the error through.
pub(crate) fn at_stage<T>(
    workflow: &'static str,
    stage: Stage,
    result: HarnessResult<T>,
) -> HarnessResult<T> {
    if let Err(e) = &result {
        warn!(workflow, stage = stage.as_str(), code = e.code(), error = %e, "workflow failed");
    }
    result
}

/// Output of the reformulate, retrieve and answer stages.
pub(crate) struct Generation {
    pub query: String,
    pub answer: String,
}

impl Engine {
    /// `ResolvingContext` and `Indexing`: load the corpus for `key` and
    /// embed it into a retriever scoped to this request.
    pub(crate) async fn index_context(
        &self,
        workflow: &'static str,
        key: &ContextKey,
    ) -> HarnessResult<Retriever> {
        let documents = at_stage(workflow, Stage::ResolvingContext, self.corpus.resolve(key).await)?;

        let retriever = at_stage(
            workflow,
            Stage::Indexing,
            build_retriever(&documents, self.embedder.clone(), &self.params)
                .await
                .map_err(HarnessError::upstream),
        )?;
        debug!(workflow, context = %key, chunks = retriever.len(), "indexed context");
        Ok(retriever)
    }

    /// `Reformulating`, `Retrieving` and `Generating`.
    ///
    /// The reformulated query only drives retrieval; the answer prompt
    /// always receives the original input. An empty reformulation falls
    /// back to the input.
    pub(crate) async fn generate(
        &self,
        workflow: &'static str,
        retriever: &Retriever,
        prompts: &PromptPair,
        input: &str,
        history: &[Message],
    ) -> HarnessResult<Generation> {
        let rewrite = prompts.reformulate.bind(&Bindings {
            input,
            context: "",
            history,
        });
        let query = at_stage(
            workflow,
            Stage::Reformulating,
            self.completer
                .complete(&rewrite)
                .await
                .map_err(HarnessError::upstream),
        )?;
        let query = match query.trim() {
            "" => input.to_string(),
            q => q.to_string(),
        };
        debug!(workflow, query = %query, "reformulated query");

        let hits = at_stage(
            workflow,
            Stage::Retrieving,
            retriever.retrieve(&query).await.map_err(HarnessError::upstream),
        )?;
        let context = format_context(&hits);
        debug!(workflow, hits = hits.len(), context_chars = context.len(), "retrieved context");

        let messages = prompts.answer.bind(&Bindings {
            input,
            context: &context,
            history,
        });
        let answer = at_stage(
            workflow,
            Stage::Generating,
            self.completer
                .complete(&messages)
                .await
                .map_err(HarnessError::upstream),
        )?;

        Ok(Generation { query, answer })
    }
}
