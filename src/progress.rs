//! Progress-callback trait for batch pipeline events.
//!
//! Inject an [`Arc<dyn BatchProgress>`] via
//! [`crate::config::ParserConfigBuilder::progress`] to receive events as the
//! orchestrator works through documents and pages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a log file, or a UI —
//! without the library knowing anything about how the host application
//! communicates. All methods have default no-op implementations so callers
//! only override what they care about.

use std::sync::Arc;

/// Called by the orchestrator as the batch progresses.
///
/// The pipeline is strictly sequential, so calls arrive in order and never
/// concurrently; implementations do not need interior synchronisation.
pub trait BatchProgress: Send + Sync {
    /// Called once after discovery, before any document is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document's pipeline begins (0-based `index`).
    fn on_document_start(&self, doc_base: &str, index: usize, total_documents: usize) {
        let _ = (doc_base, index, total_documents);
    }

    /// Called after rasterisation, before the first page transcription.
    fn on_pages_rasterized(&self, doc_base: &str, total_pages: usize) {
        let _ = (doc_base, total_pages);
    }

    /// Called just before a page is sent to the vision model (0-based index).
    fn on_page_start(&self, doc_base: &str, page_index: usize, total_pages: usize) {
        let _ = (doc_base, page_index, total_pages);
    }

    /// Called once a page's markdown is durably appended to the transcript.
    fn on_page_complete(
        &self,
        doc_base: &str,
        page_index: usize,
        total_pages: usize,
        markdown_len: usize,
    ) {
        let _ = (doc_base, page_index, total_pages, markdown_len);
    }

    /// Called when a document reaches `Done`.
    fn on_document_complete(&self, doc_base: &str, pages: usize, chapters: usize) {
        let _ = (doc_base, pages, chapters);
    }

    /// Called when a document fails; the batch continues with the next one.
    fn on_document_failed(&self, doc_base: &str, stage: &str, error: &str) {
        let _ = (doc_base, stage, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopBatchProgress;

impl BatchProgress for NoopBatchProgress {}

/// Convenience alias matching the type stored in [`crate::config::ParserConfig`].
pub type ProgressHandle = Arc<dyn BatchProgress>;
