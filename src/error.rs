//! Error types for the notemill library.
//!
//! One enum covers the whole taxonomy; what distinguishes variants in
//! practice is WHERE they surface. Errors raised inside a document's
//! pipeline (unreadable PDF, failed model call, malformed linter output)
//! are downgraded by the batch loop into a recorded
//! [`crate::report::DocumentReport`] entry and the batch continues. Errors
//! raised during startup (bad configuration, no models installed,
//! unreadable settings) abort the run before any document is touched.
//!
//! Messages are written for the person holding the terminal: where a failure
//! has a known fix (install a model, point at a pdfium library), the fix is
//! part of the message.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the notemill library.
#[derive(Debug, Error)]
pub enum NotemillError {
    // ── Source / rasterisation errors ─────────────────────────────────────
    /// The PDF could not be opened, decoded, or rendered.
    #[error("Cannot read PDF '{path}': {detail}\nThe file may be corrupt; try re-exporting or re-scanning it.")]
    SourceRead { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium and either:\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir containing libpdfium, or\n\
  • Place libpdfium.so / libpdfium.dylib next to the binary, or\n\
  • Install it as a system library.\n\
Prebuilt binaries: https://github.com/bblanchon/pdfium-binaries\n"
    )]
    PdfiumBinding(String),

    // ── Model service errors ──────────────────────────────────────────────
    /// The external model process could not be spawned, exited non-zero,
    /// or timed out. `detail` carries the service's stderr (or the timeout).
    #[error("Model '{model}' invocation failed: {detail}")]
    ModelInvocation { model: String, detail: String },

    /// `ollama list` returned no usable models.
    #[error(
        "No Ollama models are available.\n\
At least one model with vision capabilities is required. Recommended: qwen2.5vl:7b\n\
Install one with: ollama pull qwen2.5vl:7b"
    )]
    NoModelsAvailable,

    /// An explicitly requested model is not in the available-models list.
    #[error("Model '{model}' is not available.\nInstalled models: {}", available.join(", "))]
    ModelNotAvailable {
        model: String,
        available: Vec<String>,
    },

    /// The linter's stdout was not a valid array of chapter records.
    #[error("Linter output is not a valid chapter list ({detail}).\nRaw output:\n{raw}")]
    MalformedLinterOutput { detail: String, raw: String },

    // ── Sequencing errors ─────────────────────────────────────────────────
    /// The splitter was invoked before any transcript was accumulated.
    #[error("No transcript found at '{path}'\nRun the parser stage first; splitting requires an accumulated transcript.")]
    MissingTranscript { path: PathBuf },

    /// A page was appended out of order — a sequencing bug, fatal to the document.
    #[error("Out-of-order append for '{doc}': expected page {expected}, got page {got}")]
    OutOfOrderAppend {
        doc: String,
        expected: usize,
        got: usize,
    },

    // ── Resource errors ───────────────────────────────────────────────────
    /// A prompt template file could not be read.
    #[error("Failed to read prompt template '{path}': {source}")]
    PromptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// settings.json could not be read, parsed, or written.
    #[error("Settings file '{path}': {detail}")]
    Settings { path: PathBuf, detail: String },

    /// File plumbing (temp dir, transcripts, chapters, page images).
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a background task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotemillError {
    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| NotemillError::Io { path, source }
    }
}
