//! Fixed-size overlapping text windows.
//!
//! Chunks are cut on `char` boundaries so multi-byte input never splits a code
//! point. Consecutive chunks share exactly `chunk_overlap` characters; the
//! window advances by `chunk_size - chunk_overlap` each step, so the overlap
//! is an observable contract rather than a best-effort hint. The final chunk
//! may be shorter than `chunk_size` but is never empty.

use super::types::ChunkingError;

/// A chunk of source text together with its position in the original document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk text content.
    pub content: String,
    /// Offset of the first character, counted in characters from the start of
    /// the source text.
    pub char_offset: usize,
}

/// Split text into overlapping windows of at most `chunk_size` characters.
///
/// Returns an empty vector when the input is all whitespace. Fails when the
/// overlap leaves no room for the window to advance or when `chunk_size` is
/// zero; both conditions are also rejected at startup by config validation,
/// so hitting them here means the caller bypassed it.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<TextChunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if chunk_overlap >= chunk_size {
        return Err(ChunkingError::OverlapExceedsChunkSize {
            chunk_size,
            chunk_overlap,
        });
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end of the text, so a
    // window [i, j) in character space maps to a cheap byte-range slice.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());
    let char_count = boundaries.len() - 1;

    let stride = chunk_size - chunk_overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        chunks.push(TextChunk {
            content: text[boundaries[start]..boundaries[end]].to_string(),
            char_offset: start,
        });
        if end == char_count {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}
