//! # notemill
//!
//! Turn scanned PDF notes into clean, chaptered Markdown using local Ollama
//! models.
//!
//! ## Why this crate?
//!
//! Handwritten and printed scans defeat classic text extraction — there is
//! no embedded text to extract. notemill rasterises each page and lets a
//! local vision model read it as a human would, then hands the accumulated
//! transcript to a second model that splits it into logical chapters, each
//! persisted as its own Markdown file. Both models run through the `ollama`
//! CLI, so nothing leaves the machine.
//!
//! ## Pipeline Overview
//!
//! ```text
//! notes/*.pdf
//!  │
//!  ├─ 1. Raster      each page → temp/{doc}_page{N}.jpg (pdfium, spawn_blocking)
//!  ├─ 2. Transcribe  vision model reads one page → Markdown (fences stripped)
//!  ├─ 3. Accumulate  ordered append into temp/{doc}.md, page image deleted
//!  ├─ 4. Split       linter model → JSON chapter records → temp/{name}.md
//!  └─ 5. Watermark   settings.json "last_ran_parser" advanced to now
//! ```
//!
//! Documents and pages are processed strictly sequentially: the model
//! service is GPU-bound and serialises requests internally, so concurrency
//! would only add contention. One bad PDF never blocks the batch — failures
//! are recorded per document and the run continues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notemill::{run_batch, ParserConfig, Settings};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings_path = Path::new("settings.json");
//!     let mut settings = Settings::load_or_init(settings_path).await?;
//!
//!     let config = ParserConfig::builder()
//!         .notes_dir("notes")
//!         .temp_dir("temp")
//!         .build()?;
//!
//!     let report = run_batch(&config, &mut settings).await?;
//!     settings.save(settings_path).await?;
//!
//!     for doc in &report.documents {
//!         println!("{}: {} pages, {} chapters", doc.doc_base, doc.pages, doc.chapters.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notemill` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! notemill = { version = "0.3", default-features = false }
//! ```
//!
//! ## Requirements
//!
//! - A running [Ollama](https://ollama.com) install with at least one
//!   vision-capable model (recommended: `qwen2.5vl:7b`).
//! - `libpdfium` reachable via `PDFIUM_LIB_PATH`, the working directory, or
//!   the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod notes;
pub mod ollama;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod settings;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::run_batch;
pub use config::{ModelSelection, ParserConfig, ParserConfigBuilder};
pub use error::NotemillError;
pub use notes::{discover_documents, human_size, FileEntry, SourceDocument};
pub use ollama::{ModelRunner, OllamaRunner};
pub use pipeline::accumulate::TranscriptAccumulator;
pub use pipeline::raster::{PageImage, PageRasterizer, PdfiumRasterizer};
pub use pipeline::split::{ChapterRecord, ChapterSplitter};
pub use pipeline::transcribe::clean_page_markdown;
pub use progress::{BatchProgress, NoopBatchProgress, ProgressHandle};
pub use prompts::PromptTemplate;
pub use report::{BatchStats, DocumentReport, RunReport, Stage};
pub use settings::Settings;
