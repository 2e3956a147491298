//! Ephemeral per-request semantic index.
//!
//! [`build_retriever`] chunks the request's documents, embeds every chunk
//! in one batch, and keeps the vectors in memory. [`Retriever::retrieve`]
//! embeds a query and returns the `top_k` most similar chunks by brute
//! force cosine similarity. Nothing is cached: the index lives exactly as
//! long as one workflow invocation.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use crate::chunk::{chunk_document, ChunkParams};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::{Chunk, Document};

pub const DEFAULT_TOP_K: usize = 4;

/// Chunking and retrieval tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub chunking: ChunkParams,
    pub top_k: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            chunking: ChunkParams::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// A chunk returned from retrieval with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory nearest-neighbor index over one request's chunks.
pub struct Retriever {
    entries: Vec<IndexedChunk>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Return the `top_k` chunks most similar to `query`, best first.
    /// Ties keep chunk order.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_one(query).await?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&query_vec, &e.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(self.top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievedChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

/// Chunk and embed `documents` into a fresh [`Retriever`].
pub async fn build_retriever(
    documents: &[Document],
    embedder: Arc<dyn EmbeddingProvider>,
    params: &RetrievalParams,
) -> Result<Retriever> {
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|doc| chunk_document(doc, &params.chunking))
        .collect();

    let entries = if chunks.is_empty() {
        Vec::new()
    } else {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }
        chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk { chunk, vector })
            .collect()
    };

    debug!(
        documents = documents.len(),
        chunks = entries.len(),
        model = embedder.model_name(),
        "built retriever"
    );

    Ok(Retriever {
        entries,
        embedder,
        top_k: params.top_k.max(1),
    })
}

/// Join retrieved chunks the way they are stuffed into the answer prompt.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
