//! Batch run reports: per-document outcomes plus whole-batch stats.
//!
//! Everything here is `Serialize` so the CLI's `--json` mode can emit the
//! whole report for scripting.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// The pipeline stage a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rasterize,
    Transcribe,
    Split,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Rasterize => "rasterize",
            Stage::Transcribe => "transcribe",
            Stage::Split => "split",
        };
        f.write_str(s)
    }
}

/// Outcome of one document's pipeline run.
///
/// A failed document records the stage it died in and the full diagnostic;
/// later stages for that document were skipped. Pages transcribed before a
/// transcription failure remain counted (and remain on disk in the
/// transcript file).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Source document base name (path stem).
    pub doc_base: String,
    /// Pages durably appended to the transcript.
    pub pages: usize,
    /// Chapter files written, in linter emission order.
    pub chapters: Vec<PathBuf>,
    /// Stage the document failed in, if it failed.
    pub failed_stage: Option<Stage>,
    /// Full diagnostic text for a failure.
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Whole-batch counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub documents: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pages_transcribed: usize,
    pub chapters_written: usize,
    pub total_duration_ms: u64,
}

/// Result of one full batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Per-document outcomes, in batch order.
    pub documents: Vec<DocumentReport>,
    pub stats: BatchStats,
    /// The watermark written at batch completion.
    pub watermark: String,
}
