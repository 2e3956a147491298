//! Error taxonomy for the workflow boundary.
//!
//! Collaborators (stores, embedding and completion providers) report
//! failures as [`anyhow::Error`]. Everything that crosses a workflow
//! entry point is converted into a [`HarnessError`], which always has a
//! machine-readable [`code`](HarnessError::code) and serializes into the
//! structured [`ErrorBody`] returned to callers.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// A context, epic, ticket, link, template or question is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// The persistence layer is unreachable or failed.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A required key field is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedding or completion collaborator failed.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub fn not_found(what: impl Into<String>) -> Self {
        HarnessError::NotFound(what.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        HarnessError::InvalidInput(message.into())
    }

    /// Wrap a store failure. The full `anyhow` chain is kept in the message.
    pub fn data_unavailable(err: anyhow::Error) -> Self {
        HarnessError::DataUnavailable(format!("{:#}", err))
    }

    pub fn upstream(err: anyhow::Error) -> Self {
        HarnessError::UpstreamFailure(format!("{:#}", err))
    }

    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::NotFound(_) => "not_found",
            HarnessError::DataUnavailable(_) => "data_unavailable",
            HarnessError::InvalidInput(_) => "invalid_input",
            HarnessError::UpstreamFailure(_) => "upstream_failure",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            details: Some(self.code().to_string()),
        }
    }
}

/// Structured error result: `{ "error": message, "details"?: code }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
