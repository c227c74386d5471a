use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("document is empty")]
    Empty,
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Turns a retrieved document into plain text, one visual line per line.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, document: &[u8]) -> Result<String, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, document: &[u8]) -> Result<String, ExtractionError> {
        if document.is_empty() {
            return Err(ExtractionError::Empty);
        }
        // pdf-extract panics on some malformed inputs instead of returning an error.
        match panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(document)
        })) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(ExtractionError::Malformed(err.to_string())),
            Err(_) => Err(ExtractionError::Malformed(
                "pdf parser aborted on this document".to_string(),
            )),
        }
    }
}
