//! Uploaded-document text extraction.
//!
//! Supports the two source formats the service accepts: PDF (text content
//! only, extracted with `lopdf`) and UTF-8 plain text. The loader works on the
//! uploaded bytes directly; nothing is written to disk.

use std::path::Path;
use thiserror::Error;

/// Errors raised while extracting text from an uploaded file.
///
/// Every variant maps to a client error at the HTTP boundary: the file either
/// has an unsupported type or cannot be read as the type it claims to be.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// File extension is neither `.pdf` nor `.txt`.
    #[error("Unsupported file type '{extension}'. Use .pdf or .txt")]
    UnsupportedType {
        /// Extension taken from the uploaded filename.
        extension: String,
    },
    /// PDF could not be parsed or its text content extracted.
    #[error("Failed to read PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    /// Text file was not valid UTF-8.
    #[error("Text file is not valid UTF-8")]
    NotUtf8,
    /// No extractable text was found in the document.
    #[error("Document contains no extractable text")]
    EmptyDocument,
}

/// Extract raw text from an uploaded file based on its filename extension.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, LoaderError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "pdf" => extract_pdf_text(bytes)?,
        "txt" => String::from_utf8(bytes.to_vec()).map_err(|_| LoaderError::NotUtf8)?,
        _ => return Err(LoaderError::UnsupportedType { extension }),
    };

    if text.trim().is_empty() {
        return Err(LoaderError::EmptyDocument);
    }
    Ok(text)
}

/// Extract the text content of every page in the PDF, in page order.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, LoaderError> {
    let document = lopdf::Document::load_mem(bytes)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    tracing::debug!(pages = pages.len(), "Extracting PDF text");
    let text = document.extract_text(&pages)?;
    Ok(text)
}
