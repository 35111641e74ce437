//! Text extraction from uploaded documents.
//!
//! Callers hand over bytes and a content type (or a path, whose extension
//! picks the content type); this module returns plain UTF-8 text. PDF goes
//! through `pdf-extract`; plain text and Markdown pass through unchanged.
//!
//! Extraction never panics. Every failure is an [`ExtractError`], which
//! converts into [`PipelineError::Extraction`] so the build never starts on
//! a document that could not be read.

use std::path::Path;

use docqa_core::error::PipelineError;
use thiserror::Error;
use tracing::debug;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        PipelineError::Extraction(err.to_string())
    }
}

/// Extract plain text from `bytes` of the given MIME type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8(bytes.to_vec())?),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// Read `path` and extract its text, choosing the content type from the
/// file extension.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let content_type = content_type_for(path)?;
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let text = extract_text(&bytes, content_type)?;
    debug!(
        path = %path.display(),
        content_type,
        bytes = bytes.len(),
        chars = text.chars().count(),
        "extracted text"
    );
    Ok(text)
}

/// Map a file extension onto a supported content type.
pub fn content_type_for(path: &Path) -> Result<&'static str, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(MIME_PDF),
        "txt" | "text" => Ok(MIME_TEXT),
        "md" | "markdown" => Ok(MIME_MARKDOWN),
        "" => Err(ExtractError::UnsupportedContentType(format!(
            "{} has no file extension",
            path.display()
        ))),
        other => Err(ExtractError::UnsupportedContentType(format!(
            ".{} ({})",
            other,
            path.display()
        ))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
