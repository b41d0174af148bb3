//! Document-QA pipeline: loading, chunking, embedding, retrieval, generation.

pub mod chunking;
mod mappers;
mod service;
pub mod types;

pub use chunking::{TextChunk, chunk_text};
pub use service::{RagApi, RagService};
pub use types::{ChunkingError, IngestOutcome, RagError};
