//! Upload parsing: PDF payloads in, one [`Document`] per page out.
//!
//! Every payload is spooled to a named temporary file for the extractor and the file is
//! removed when the handle drops, on success and failure alike. Files are parsed one after
//! another on the blocking pool so page order and file order are preserved.

use crate::store::Document;
use axum::body::Bytes;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning uploads into documents.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Temporary file could not be created or written.
    #[error("Failed to spool upload '{filename}': {source}")]
    TempFile {
        /// Client-supplied file name.
        filename: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Extractor could not read the payload as a PDF.
    #[error("Failed to parse '{filename}': {message}")]
    Parse {
        /// Client-supplied file name.
        filename: String,
        /// Extractor diagnostic.
        message: String,
    },
    /// Blocking parse task was cancelled.
    #[error("Parse task for '{0}' was cancelled")]
    Cancelled(String),
}

/// File received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name (empty when the part carried none).
    pub filename: String,
    /// Raw file contents.
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Pair a file name with its contents.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Blocking page-text extractor operating on a file path.
pub trait PageExtractor: Send + Sync {
    /// Return the text of each page in document order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, String>;
}

/// [`PageExtractor`] backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageExtractor;

impl PageExtractor for PdfPageExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, String> {
        pdf_extract::extract_text_by_pages(path).map_err(|error| error.to_string())
    }
}

/// Converts uploaded files into page documents.
#[derive(Clone)]
pub struct DocumentLoader {
    extractor: Arc<dyn PageExtractor>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader {
    /// Loader using the PDF extractor.
    pub fn new() -> Self {
        Self::with_extractor(Arc::new(PdfPageExtractor))
    }

    /// Loader using a caller-supplied extractor.
    pub fn with_extractor(extractor: Arc<dyn PageExtractor>) -> Self {
        Self { extractor }
    }

    /// Parse every file, concatenating their pages into one flat sequence.
    ///
    /// The first failing file aborts the load; nothing parsed before it is returned.
    pub async fn load(&self, files: Vec<UploadedFile>) -> Result<Vec<Document>, LoaderError> {
        let mut documents = Vec::new();

        for file in files {
            let extractor = Arc::clone(&self.extractor);
            let filename = file.filename.clone();
            let pages = tokio::task::spawn_blocking(move || load_file(extractor.as_ref(), &file))
                .await
                .map_err(|error| {
                    if error.is_panic() {
                        LoaderError::Parse {
                            filename: filename.clone(),
                            message: "extractor panicked on malformed input".into(),
                        }
                    } else {
                        LoaderError::Cancelled(filename.clone())
                    }
                })??;

            tracing::debug!(file = %filename, pages = pages.len(), "Upload parsed");
            documents.extend(pages);
        }

        Ok(documents)
    }
}

fn load_file(
    extractor: &dyn PageExtractor,
    file: &UploadedFile,
) -> Result<Vec<Document>, LoaderError> {
    let spool_error = |source| LoaderError::TempFile {
        filename: file.filename.clone(),
        source,
    };
    let mut temp = tempfile::Builder::new()
        .prefix("docrag-")
        .suffix(".pdf")
        .tempfile()
        .map_err(spool_error)?;
    temp.write_all(&file.bytes).map_err(spool_error)?;
    temp.flush().map_err(spool_error)?;

    let pages = extractor
        .extract_pages(temp.path())
        .map_err(|message| LoaderError::Parse {
            filename: file.filename.clone(),
            message,
        })?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| {
            let mut metadata = Map::new();
            metadata.insert("source".into(), Value::String(file.filename.clone()));
            metadata.insert("page".into(), Value::from(page));
            Document::new(text, metadata)
        })
        .collect())
}
