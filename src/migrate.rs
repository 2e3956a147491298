use anyhow::Result;
use sqlx::SqlitePool;

/// Create every table and index. Safe to run on each startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Project aggregates; nested collections are stored as JSON text
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            project_name TEXT PRIMARY KEY,
            github_link TEXT NOT NULL DEFAULT '[]',
            jira_link TEXT NOT NULL DEFAULT '[]',
            docs_link TEXT NOT NULL DEFAULT '[]',
            confluence_link TEXT NOT NULL DEFAULT '[]',
            issues TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompts (
            role TEXT PRIMARY KEY,
            contextualize_q_system_prompt TEXT NOT NULL,
            qa_system_prompt TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            sender TEXT NOT NULL,
            content TEXT NOT NULL,
            input_token_count INTEGER NOT NULL DEFAULT 0,
            output_token_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per context that has a generated question batch
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clarify_batches (
            batch_key TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            epic_key TEXT NOT NULL,
            ticket_key TEXT,
            url TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clarify_questions (
            session_id TEXT PRIMARY KEY,
            batch_key TEXT NOT NULL,
            question TEXT NOT NULL,
            project_name TEXT NOT NULL,
            epic_key TEXT NOT NULL,
            ticket_key TEXT,
            url TEXT,
            status TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (batch_key) REFERENCES clarify_batches(batch_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_clarify_questions_batch ON clarify_questions(batch_key)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
