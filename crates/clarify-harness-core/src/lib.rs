//! # Clarify Harness Core
//!
//! Transport-independent logic for Clarify Harness: data models, the
//! corpus loader, chunking and retrieval, prompt assembly, the store
//! trait, and the clarify / suggest / chat workflow engine.
//!
//! This crate contains no tokio runtime, sqlx, HTTP clients, or
//! filesystem I/O. Persistence, embeddings, completions and token
//! counting are reached through traits, so the application crate (or a
//! test) decides which implementations to plug in.

pub mod catalog;
pub mod chunk;
pub mod completion;
pub mod conversation;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod store;
pub mod tokens;
pub mod workflow;
