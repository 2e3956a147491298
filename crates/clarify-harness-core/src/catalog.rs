//! Read-side views over stored projects, plus project ingestion.
//!
//! Backs the project/epic/ticket pickers and link listings that front
//! ends use to build a [`ContextKey`](crate::models::ContextKey).

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::corpus::find_epic;
use crate::error::{HarnessError, HarnessResult};
use crate::models::{LinkedPage, LinkedSources, Project};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpicSummary {
    pub key: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketSummary {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
}

/// Links attached to a project, epic or ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkListing {
    pub confluence: Vec<String>,
    #[serde(rename = "googleDocs")]
    pub google_docs: Vec<String>,
    #[serde(rename = "otherLinks")]
    pub other_links: Vec<String>,
}

impl From<&LinkedSources> for LinkListing {
    fn from(s: &LinkedSources) -> Self {
        let urls = |pages: &[LinkedPage]| -> Vec<String> {
            pages.iter().map(|p| p.url.clone()).collect()
        };
        Self {
            confluence: urls(&s.confluence),
            google_docs: urls(&s.google_docs),
            other_links: s.other_links.clone(),
        }
    }
}

pub struct ProjectCatalog {
    store: Arc<dyn Store>,
}

impl ProjectCatalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert or merge a project record keyed by `project_name`.
    pub async fn ingest(&self, project: &Project) -> HarnessResult<()> {
        if project.project_name.trim().is_empty() {
            return Err(HarnessError::invalid_input("project_name is required"));
        }
        self.store
            .upsert_project(project)
            .await
            .map_err(HarnessError::data_unavailable)?;
        info!(
            project = %project.project_name,
            epics = project.issues.len(),
            "ingested project"
        );
        Ok(())
    }

    pub async fn list_projects(&self) -> HarnessResult<Vec<String>> {
        self.store
            .list_project_names()
            .await
            .map_err(HarnessError::data_unavailable)
    }

    pub async fn list_epics(&self, project_name: &str) -> HarnessResult<Vec<EpicSummary>> {
        let project = self.project(project_name).await?;
        Ok(project
            .issues
            .iter()
            .map(|e| EpicSummary {
                key: e.key.clone(),
                summary: e.summary.clone(),
            })
            .collect())
    }

    pub async fn list_tickets(
        &self,
        project_name: &str,
        epic_key: &str,
    ) -> HarnessResult<Vec<TicketSummary>> {
        let project = self.project(project_name).await?;
        let epic = find_epic(&project, epic_key)?;
        Ok(epic
            .tasks
            .iter()
            .map(|t| TicketSummary {
                key: t.key.clone(),
                summary: t.summary.clone(),
                issue_type: t.issue_type.clone(),
            })
            .collect())
    }

    /// Project-level links without an epic, the epic's sources with only
    /// an epic, and the ticket's sources with both.
    pub async fn links(
        &self,
        project_name: &str,
        epic_key: Option<&str>,
        ticket_key: Option<&str>,
    ) -> HarnessResult<LinkListing> {
        let project = self.project(project_name).await?;
        let Some(epic_key) = epic_key else {
            return Ok(LinkListing {
                confluence: project.confluence_link.clone(),
                google_docs: project.docs_link.clone(),
                other_links: project
                    .github_link
                    .iter()
                    .chain(project.jira_link.iter())
                    .cloned()
                    .collect(),
            });
        };

        let epic = find_epic(&project, epic_key)?;
        match ticket_key {
            None => Ok(LinkListing::from(&epic.source)),
            Some(ticket_key) => epic
                .task(ticket_key)
                .map(|t| LinkListing::from(&t.source))
                .ok_or_else(|| HarnessError::not_found(format!("ticket '{}'", ticket_key))),
        }
    }

    async fn project(&self, project_name: &str) -> HarnessResult<Project> {
        self.store
            .get_project(project_name)
            .await
            .map_err(HarnessError::data_unavailable)?
            .ok_or_else(|| HarnessError::not_found(format!("project '{}'", project_name)))
    }
}
