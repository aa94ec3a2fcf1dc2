//! The per-document transcript: a crash-tolerant, ordered append sink.
//!
//! The accumulator stays deliberately dumb: each append is an independent
//! open/append/flush on `{doc_base}.md`, so a failure on page N never loses
//! pages 0..N-1 — they are already durable, and the transcript file is left
//! intact for manual recovery.
//!
//! The ordering contract, however, is enforced rather than trusted: an
//! internal sequence counter rejects any append whose page index is not the
//! next expected one. Content order in the transcript must always match
//! page-index order, and a violated sequence is a bug worth failing the
//! document over, not silently reordering.
//!
//! Construction truncates the transcript, so re-running a document can never
//! duplicate content from a previous run.

use crate::error::NotemillError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Ordered append sink for one document's transcript. One per document run.
#[derive(Debug)]
pub struct TranscriptAccumulator {
    doc_base: String,
    path: PathBuf,
    pages_written: usize,
}

impl TranscriptAccumulator {
    /// Create (or truncate) the transcript file `{doc_base}.md` in `temp_dir`.
    pub async fn create(temp_dir: &Path, doc_base: &str) -> Result<Self, NotemillError> {
        let path = transcript_path(temp_dir, doc_base);
        tokio::fs::write(&path, b"")
            .await
            .map_err(NotemillError::io(&path))?;
        Ok(Self {
            doc_base: doc_base.to_string(),
            path,
            pages_written: 0,
        })
    }

    /// Append one page's markdown followed by a blank-line separator.
    ///
    /// `page_index` must be exactly the number of pages already written;
    /// anything else is [`NotemillError::OutOfOrderAppend`].
    pub async fn append(&mut self, page_index: usize, markdown: &str) -> Result<(), NotemillError> {
        if page_index != self.pages_written {
            return Err(NotemillError::OutOfOrderAppend {
                doc: self.doc_base.clone(),
                expected: self.pages_written,
                got: page_index,
            });
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(NotemillError::io(&self.path))?;
        file.write_all(markdown.as_bytes())
            .await
            .map_err(NotemillError::io(&self.path))?;
        file.write_all(b"\n\n")
            .await
            .map_err(NotemillError::io(&self.path))?;
        file.flush().await.map_err(NotemillError::io(&self.path))?;

        self.pages_written += 1;
        Ok(())
    }

    /// Pages appended so far.
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Path of the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Path of a document's transcript: `{temp_dir}/{doc_base}.md`.
pub fn transcript_path(temp_dir: &Path, doc_base: &str) -> PathBuf {
    temp_dir.join(format!("{doc_base}.md"))
}
