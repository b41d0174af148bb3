//! Core data types and error definitions for the ingestion and query pipeline.

use crate::{
    embedding::EmbeddingClientError, generation::GenerationError, loader::LoaderError,
    supabase::StoreError,
};
use thiserror::Error;

/// Errors produced while splitting raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Window cannot advance when the overlap consumes the whole chunk.
    #[error("chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapExceedsChunkSize {
        /// Configured chunk size in characters.
        chunk_size: usize,
        /// Configured overlap in characters.
        chunk_overlap: usize,
    },
    /// Chunk size of zero can never produce a non-empty chunk.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the document-QA pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Uploaded file could not be read as text.
    #[error("Failed to load document: {0}")]
    Loader(#[from] LoaderError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store interaction failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
    /// Chat provider failed to start a completion.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
    /// Request was malformed before the pipeline could start.
    #[error("{0}")]
    InvalidRequest(String),
}

impl RagError {
    /// Whether the failure was caused by the request rather than the service.
    ///
    /// Drives the 400-vs-500 split at the HTTP boundary.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Loader(_) | Self::InvalidRequest(_))
    }
}

/// Summary of a completed ingestion produced by
/// [`crate::processing::RagService::ingest_document`].
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// Number of chunks stored for the document.
    pub chunks_stored: usize,
    /// Chunks skipped within the request due to duplicate content.
    pub skipped_duplicates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_failures_are_client_errors() {
        let error = RagError::Loader(LoaderError::UnsupportedType {
            extension: "docx".into(),
        });
        assert!(error.is_client_error());
    }

    #[test]
    fn provider_failures_are_server_errors() {
        let error = RagError::EmptyEmbedding;
        assert!(!error.is_client_error());
    }
}
