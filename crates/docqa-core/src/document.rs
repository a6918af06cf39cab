//! Loading the source PDF into page-level text.
//!
//! Text extraction is done by `pdf-extract`; we only read the bytes and keep the
//! page order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::info;

/// Extracted plain text of one PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 0-based page number within the document.
    pub index: usize,
    pub text: String,
}

impl Page {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Reads the PDF at `path` and returns one [`Page`] per PDF page, in order.
pub fn load_pdf(path: &Path) -> Result<Vec<Page>, DocumentLoadError> {
    if !path.exists() {
        return Err(DocumentLoadError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(DocumentLoadError::NotAFile(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|e| DocumentLoadError::Read(path.to_path_buf(), e))?;
    let pages = pages_from_bytes(&bytes).map_err(|e| match e {
        DocumentLoadError::InvalidPdf(_, msg) => DocumentLoadError::InvalidPdf(path.to_path_buf(), msg),
        other => other,
    })?;
    info!(path = %path.display(), pages = pages.len(), "Loaded PDF");
    Ok(pages)
}

/// Extracts pages from an in-memory PDF.
///
/// `pdf-extract` panics on some structurally broken files (e.g. a page without
/// fonts); that is reported as [`DocumentLoadError::InvalidPdf`] too.
pub fn pages_from_bytes(bytes: &[u8]) -> Result<Vec<Page>, DocumentLoadError> {
    let invalid = |msg: String| DocumentLoadError::InvalidPdf(PathBuf::from("<memory>"), msg);
    let texts = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes)))
        .map_err(|payload| invalid(format!("text extraction panicked: {}", panic_message(&*payload))))?
        .map_err(|e| invalid(e.to_string()))?;
    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page { index, text })
        .collect())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentLoadError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("not a valid PDF {0}: {1}")]
    InvalidPdf(PathBuf, String),
}
