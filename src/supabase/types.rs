//! Shared types used by the Supabase gateway.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Supabase URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by PostgREST.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Row persisted to the `documents` table.
///
/// The field set mirrors the external schema contract exactly:
/// `documents(id, content, metadata jsonb, embedding vector(1536))` with `id`
/// assigned server-side.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRow {
    /// Chunk text content.
    pub content: String,
    /// Metadata object (source, upload id, position, timestamps).
    pub metadata: Value,
    /// Embedding vector produced for the chunk.
    pub embedding: Vec<f32>,
}

/// Chunk returned by a similarity search, ranked by the store.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Stored chunk text.
    pub content: String,
    /// Stored metadata object; empty when the row carried none.
    pub metadata: Map<String, Value>,
    /// Similarity reported by the store, `1 - cosine_distance`.
    pub similarity: f32,
}

impl RetrievedChunk {
    /// Source filename recorded at ingestion time, when present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

#[derive(Deserialize)]
pub(crate) struct MatchedRow {
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) metadata: Value,
    pub(crate) similarity: f32,
}

impl From<MatchedRow> for RetrievedChunk {
    fn from(row: MatchedRow) -> Self {
        let metadata = match row.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            content: row.content,
            metadata,
            similarity: row.similarity,
        }
    }
}
