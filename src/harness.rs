//! Process wiring: builds every collaborator from the config and hands
//! them to the workflow [`Engine`].
//!
//! ```text
//! Config ─▶ SqlitePool ─▶ migrations ─▶ SqliteStore ─┐
//!        ├▶ embedding provider ──────────────────────┤
//!        ├▶ completion provider ─────────────────────┼─▶ Engine
//!        └▶ token counter ───────────────────────────┘
//! ```
//!
//! A [`Harness`] is opened once at startup and closed at shutdown.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use clarify_harness_core::workflow::Engine;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::llm::create_completion;
use crate::migrate;
use crate::sqlite_store::SqliteStore;
use crate::tokenizer::create_token_counter;

pub struct Harness {
    pool: SqlitePool,
    engine: Arc<Engine>,
}

impl Harness {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config)
            .await
            .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
        migrate::run_migrations(&pool).await?;

        let store = Arc::new(SqliteStore::new(pool.clone()));
        let embedder = create_provider(&config.embedding)?;
        let completer = create_completion(&config.llm)?;
        let tokens = create_token_counter(&config.tokenizer)?;

        info!(
            db = %config.db.path.display(),
            embedding = embedder.model_name(),
            llm = completer.model_name(),
            "harness ready"
        );

        let engine = Engine::new(store, embedder, completer)
            .with_token_counter(tokens)
            .with_params(config.retrieval_params());

        Ok(Self {
            pool,
            engine: Arc::new(engine),
        })
    }

    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
