//! # Clarify Harness
//!
//! Retrieval-grounded clarifying questions, answer suggestions and
//! history-aware chat over a project's epics, tickets and linked pages.
//!
//! The workflow logic lives in `clarify-harness-core`; this crate supplies
//! the concrete collaborators (SQLite store, HTTP model providers, token
//! counter) and the CLI and HTTP surfaces around them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Projects   │──▶│ Engine       │──▶│  SQLite   │
//! │  (ingest)   │   │ chunk+embed  │   │ sessions  │
//! └─────────────┘   │ retrieve+LLM │   │ questions │
//!                   └──────┬───────┘   └──────────┘
//!                 ┌────────┴────────┐
//!                 ▼                 ▼
//!           ┌──────────┐      ┌──────────┐
//!           │   CLI    │      │   HTTP   │
//!           │(clarify) │      │  (axum)  │
//!           └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! clarify init                       # create database
//! clarify ingest ./payments.json     # load a project record
//! clarify ask Payments PAY-1         # generate clarifying questions
//! clarify serve                      # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`http`] | Shared HTTP client and retry policy |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat completion providers |
//! | [`tokenizer`] | Token counter selection |
//! | [`harness`] | Wires every collaborator into the engine |
//! | [`server`] | HTTP server |
//! | [`telemetry`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod embedding;
pub mod harness;
pub mod http;
pub mod llm;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod telemetry;
pub mod tokenizer;
