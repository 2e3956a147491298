//! Resolves a [`ContextKey`] to the grounding text for one request.
//!
//! | Key fields set | Document |
//! |----------------|----------|
//! | `ticket_key` | `{task.summary, task.description}` of that ticket under the epic |
//! | `source_url` only | `{title, content}` of the epic's matching Confluence page |
//! | neither | rejected as invalid input |
//!
//! The loader is a pure read. Store failures surface as
//! [`HarnessError::DataUnavailable`].

use std::sync::Arc;

use crate::error::{HarnessError, HarnessResult};
use crate::models::{ContextKey, Document, Epic, Project};
use crate::store::Store;

pub struct CorpusLoader {
    store: Arc<dyn Store>,
}

impl CorpusLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve `key` to its documents. Currently always zero or one
    /// document; the list shape leaves room for multi-source contexts.
    pub async fn resolve(&self, key: &ContextKey) -> HarnessResult<Vec<Document>> {
        if key.ticket_key.is_none() && key.source_url.is_none() {
            return Err(HarnessError::invalid_input(
                "either ticket_key or url is required to select a context",
            ));
        }

        let project = self
            .store
            .get_project(&key.project_name)
            .await
            .map_err(HarnessError::data_unavailable)?
            .ok_or_else(|| HarnessError::not_found(format!("project '{}'", key.project_name)))?;

        resolve_in_project(&project, key).map(|doc| vec![doc])
    }
}

/// Locate the document for `key` inside an already loaded project.
pub fn resolve_in_project(project: &Project, key: &ContextKey) -> HarnessResult<Document> {
    let epic = find_epic(project, &key.epic_key)?;

    if let Some(ticket_key) = &key.ticket_key {
        let task = epic
            .task(ticket_key)
            .ok_or_else(|| HarnessError::not_found(format!("ticket '{}'", ticket_key)))?;
        return Ok(Document::new(task.summary.clone(), task.description.clone()));
    }

    if let Some(url) = &key.source_url {
        let page = epic
            .source
            .confluence
            .iter()
            .find(|p| &p.url == url)
            .ok_or_else(|| HarnessError::not_found(format!("linked page '{}'", url)))?;
        return Ok(Document::new(page.title.clone(), page.content.clone()));
    }

    Err(HarnessError::invalid_input(
        "either ticket_key or url is required to select a context",
    ))
}

pub(crate) fn find_epic<'a>(project: &'a Project, epic_key: &str) -> HarnessResult<&'a Epic> {
    project
        .epic(epic_key)
        .ok_or_else(|| HarnessError::not_found(format!("epic '{}'", epic_key)))
}
