//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the tables created by
//! [`migrate::run_migrations`](crate::migrate::run_migrations). Project
//! aggregates keep their nested collections as JSON text columns; chat
//! sessions and clarify questions live in separate tables.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use clarify_harness_core::models::{
    ChatMessage, ClarifyQuestion, ContextKey, Epic, Project, PromptTemplate, QuestionStatus, Role,
    Sender,
};
use clarify_harness_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("failed to encode JSON column")
}

fn from_json<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).with_context(|| format!("corrupt JSON in column {}", column))
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        project_name: row.get("project_name"),
        github_link: from_json(row, "github_link")?,
        jira_link: from_json(row, "jira_link")?,
        docs_link: from_json(row, "docs_link")?,
        confluence_link: from_json(row, "confluence_link")?,
        issues: from_json::<Vec<Epic>>(row, "issues")?,
    })
}

fn question_from_row(row: &SqliteRow) -> Result<ClarifyQuestion> {
    let status: Option<String> = row.get("status");
    Ok(ClarifyQuestion {
        session_id: row.get("session_id"),
        question: row.get("question"),
        project_name: row.get("project_name"),
        epic_key: row.get("epic_key"),
        ticket_key: row.get("ticket_key"),
        url: row.get("url"),
        status: status
            .map(|s| s.parse::<QuestionStatus>())
            .transpose()
            .map_err(anyhow::Error::msg)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT * FROM projects WHERE project_name = ?")
            .bind(&project.project_name)
            .fetch_optional(&mut *tx)
            .await?;

        let merged = match existing {
            Some(row) => {
                let mut stored = project_from_row(&row)?;
                stored.merge_from(project.clone());
                stored
            }
            None => project.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO projects (project_name, github_link, jira_link, docs_link,
                                  confluence_link, issues, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_name) DO UPDATE SET
                github_link = excluded.github_link,
                jira_link = excluded.jira_link,
                docs_link = excluded.docs_link,
                confluence_link = excluded.confluence_link,
                issues = excluded.issues,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&merged.project_name)
        .bind(to_json(&merged.github_link)?)
        .bind(to_json(&merged.jira_link)?)
        .bind(to_json(&merged.docs_link)?)
        .bind(to_json(&merged.confluence_link)?)
        .bind(to_json(&merged.issues)?)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_project(&self, project_name: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE project_name = ?")
            .bind(project_name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_project_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT project_name FROM projects ORDER BY project_name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("project_name")).collect())
    }

    async fn upsert_prompt(&self, template: &PromptTemplate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prompts (role, contextualize_q_system_prompt, qa_system_prompt, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(role) DO UPDATE SET
                contextualize_q_system_prompt = excluded.contextualize_q_system_prompt,
                qa_system_prompt = excluded.qa_system_prompt,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(template.role.as_str())
        .bind(&template.contextualize_q_system_prompt)
        .bind(&template.qa_system_prompt)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_prompt(&self, role: Role) -> Result<Option<PromptTemplate>> {
        let row = sqlx::query(
            "SELECT contextualize_q_system_prompt, qa_system_prompt FROM prompts WHERE role = ?",
        )
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| PromptTemplate {
            role,
            contextualize_q_system_prompt: r.get("contextualize_q_system_prompt"),
            qa_system_prompt: r.get("qa_system_prompt"),
        }))
    }

    async fn push_message(&self, session_id: &str, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (session_id, sender, content, input_token_count,
                                       output_token_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(message.sender.as_str())
        .bind(&message.content)
        .bind(message.input_token_count)
        .bind(message.output_token_count)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT sender, content, input_token_count, output_token_count, created_at
            FROM chat_messages
            WHERE session_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let sender: String = row.get("sender");
                let created_at: String = row.get("created_at");
                Ok(ChatMessage {
                    sender: sender.parse::<Sender>().map_err(anyhow::Error::msg)?,
                    content: row.get("content"),
                    input_token_count: row.get("input_token_count"),
                    output_token_count: row.get("output_token_count"),
                    timestamp: DateTime::parse_from_rfc3339(&created_at)
                        .with_context(|| format!("bad message timestamp: {}", created_at))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }

    async fn delete_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn batch_exists(&self, key: &ContextKey) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM clarify_batches WHERE batch_key = ?")
                .bind(key.batch_key())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_batch_if_absent(
        &self,
        key: &ContextKey,
        questions: &[ClarifyQuestion],
    ) -> Result<bool> {
        let batch_key = key.batch_key();
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO clarify_batches (batch_key, project_name, epic_key, ticket_key, url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(batch_key) DO NOTHING
            "#,
        )
        .bind(&batch_key)
        .bind(&key.project_name)
        .bind(&key.epic_key)
        .bind(&key.ticket_key)
        .bind(&key.source_url)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(batch_key = %batch_key, "clarify batch already present");
            return Ok(false);
        }

        for q in questions {
            sqlx::query(
                r#"
                INSERT INTO clarify_questions (session_id, batch_key, question, project_name,
                                               epic_key, ticket_key, url, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&q.session_id)
            .bind(&batch_key)
            .bind(&q.question)
            .bind(&q.project_name)
            .bind(&q.epic_key)
            .bind(&q.ticket_key)
            .bind(&q.url)
            .bind(q.status.map(|s| s.as_str()))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn find_question(
        &self,
        session_id: &str,
        key: &ContextKey,
    ) -> Result<Option<ClarifyQuestion>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, question, project_name, epic_key, ticket_key, url, status
            FROM clarify_questions
            WHERE session_id = ? AND batch_key = ?
            "#,
        )
        .bind(session_id)
        .bind(key.batch_key())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(question_from_row).transpose()
    }

    async fn set_question_status(
        &self,
        session_id: &str,
        status: Option<QuestionStatus>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE clarify_questions SET status = ? WHERE session_id = ?")
            .bind(status.map(|s| s.as_str()))
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
