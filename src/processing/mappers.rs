//! Chunk preparation and row-assembly helpers for ingestion.

use crate::processing::chunking::TextChunk;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;

/// Chunk text with positional metadata and a content hash, ready for embedding.
#[derive(Debug, Clone)]
pub(crate) struct PreparedChunk {
    /// Chunk text content.
    pub(crate) content: String,
    /// Character offset of the chunk within the source document.
    pub(crate) char_offset: usize,
    /// Position of the chunk in the original chunk sequence.
    pub(crate) chunk_index: usize,
    /// Stable digest used for dedupe.
    pub(crate) chunk_hash: String,
}

/// Remove duplicate chunks within a document, keeping the first occurrence.
///
/// Overlapping windows over repetitive source text (boilerplate headers,
/// repeated paragraphs) produce identical chunks; embedding and storing them
/// more than once only inflates the store. Returns the surviving chunks and
/// the skipped count.
pub(crate) fn dedupe_chunks(chunks: Vec<TextChunk>) -> (Vec<PreparedChunk>, usize) {
    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    let mut skipped = 0;

    for (chunk_index, chunk) in chunks.into_iter().enumerate() {
        let hash = compute_chunk_hash(&chunk.content);
        if seen.insert(hash.clone()) {
            prepared.push(PreparedChunk {
                content: chunk.content,
                char_offset: chunk.char_offset,
                chunk_index,
                chunk_hash: hash,
            });
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}

/// Build the metadata object stored alongside each chunk row.
///
/// Chunks from one upload share `source` and `upload_id`; there is no foreign
/// key linking them beyond this metadata.
pub(crate) fn build_row_metadata(
    source: &str,
    upload_id: &str,
    ingested_at: &str,
    chunk: &PreparedChunk,
) -> Value {
    let mut metadata = Map::new();
    metadata.insert("source".into(), Value::String(source.to_string()));
    metadata.insert("upload_id".into(), Value::String(upload_id.to_string()));
    metadata.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    metadata.insert("char_offset".into(), Value::from(chunk.char_offset));
    metadata.insert("chunk_hash".into(), Value::String(chunk.chunk_hash.clone()));
    metadata.insert(
        "ingested_at".into(),
        Value::String(ingested_at.to_string()),
    );
    Value::Object(metadata)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub(crate) fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for metadata storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct an identifier shared by all chunks of one upload.
pub(crate) fn generate_upload_id() -> String {
    Uuid::new_v4().to_string()
}
