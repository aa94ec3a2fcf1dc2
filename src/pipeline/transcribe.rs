//! Page transcription: one page image in, cleaned Markdown out.
//!
//! This stage is intentionally thin — all prompt text lives in
//! [`crate::prompts`] and the subprocess plumbing in [`crate::ollama`], so
//! the stage itself is just render-prompt → run-model → clean-output.
//!
//! There is no retry here: failure policy belongs to the orchestrator, which
//! treats a failed page as fatal to the document (pages already appended
//! stay on disk).
//!
//! ## Fence tolerance
//!
//! Vision models routinely wrap their whole answer in a fenced code block
//! despite the prompt saying not to. [`clean_page_markdown`] removes exactly
//! one outer wrapper — an opener line with an optional language tag and a
//! matching closer line — and nothing else. Unfenced text passes through
//! unchanged, so the cleanup is idempotent.

use crate::error::NotemillError;
use crate::ollama::ModelRunner;
use crate::prompts::PromptTemplate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Transcribe one page image to cleaned Markdown via the vision model.
pub async fn transcribe_page(
    runner: &dyn ModelRunner,
    vision_model: &str,
    template: &PromptTemplate,
    image_path: &Path,
) -> Result<String, NotemillError> {
    let prompt = template.render(&image_path.to_string_lossy()).await?;
    let raw = runner.run(vision_model, &prompt).await?;
    let cleaned = clean_page_markdown(&raw);
    debug!(
        "Transcribed {} → {} chars",
        image_path.display(),
        cleaned.len()
    );
    Ok(cleaned)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_+-]*\n(.*?)\n?```\s*$").unwrap());

/// Strip a single outer code-fence wrapper, if the whole payload is fenced.
///
/// Interior fences (real code blocks in the transcription) are untouched
/// because the pattern must match the entire trimmed payload.
pub(crate) fn strip_outer_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

/// Clean raw vision-model output: strip a wrapper fence, trim whitespace.
///
/// Idempotent — running it on already-clean text returns the text unchanged.
pub fn clean_page_markdown(raw: &str) -> String {
    strip_outer_fences(raw).trim().to_string()
}
