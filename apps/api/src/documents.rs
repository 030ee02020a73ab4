//! Résumé upload → plain text.

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("only PDF files are supported (got {0})")]
    UnsupportedType(String),

    #[error("could not read PDF: {0}")]
    Pdf(String),

    #[error("PDF extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Extracts text from an uploaded résumé. PDF parsing is CPU-bound, so it runs
/// on the blocking pool.
pub async fn extract_cv_text(content_type: &str, bytes: Vec<u8>) -> Result<String, ExtractError> {
    if content_type != PDF_CONTENT_TYPE {
        return Err(ExtractError::UnsupportedType(content_type.to_string()));
    }

    let size = bytes.len();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    info!("Extracted {} chars from {size}-byte PDF", text.len());
    Ok(normalize_whitespace(&text))
}

/// Collapses runs of blank lines and trailing spaces left behind by PDF layout.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
