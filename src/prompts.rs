//! Prompt templates for the vision and linter models.
//!
//! Centralising the prompt text here serves two purposes:
//!
//! 1. **Single source of truth** — the built-in defaults live in exactly one
//!    place, and tests can assert on them without touching a real model.
//!
//! 2. **Live editability** — the templates on disk are read fresh on every
//!    invocation, never cached, so editing `parser.txt` or `linter.txt`
//!    between two pages of the same run already takes effect.
//!
//! Each template contains exactly one placeholder token. The parser template
//! receives an image *path* (the model service resolves it locally); the
//! linter template receives the full transcript text inline.

use crate::error::NotemillError;
use std::path::{Path, PathBuf};

/// Placeholder in the parser template, replaced with the page-image path.
pub const IMAGE_PATH_PLACEHOLDER: &str = "<<IMAGEPATH>>";

/// Placeholder in the linter template, replaced with the full transcript.
pub const CONTENT_PLACEHOLDER: &str = "<<CONTENT>>";

/// File name of the page-transcription template.
pub const PARSER_PROMPT_FILE: &str = "parser.txt";

/// File name of the chapter-linting template.
pub const LINTER_PROMPT_FILE: &str = "linter.txt";

/// Default prompt for transcribing one page image to Markdown.
///
/// Written to `parser.txt` on first use when the file is absent.
pub const DEFAULT_PARSER_PROMPT: &str = r#"Transcribe the document page in the image at <<IMAGEPATH>> to clean, well-structured Markdown.

Follow these rules precisely:

1. Preserve ALL text content completely and accurately, in reading order.
2. Use # for the page title, ## for sections, ### for subsections.
3. Use - for unordered lists and 1. 2. 3. for ordered lists.
4. Convert tables to GFM pipe format.
5. Render mathematical expressions using LaTeX: $inline$ and $$display$$.
6. Ignore page numbers and repeated headers/footers.
7. Output ONLY the Markdown content. Do NOT wrap it in ``` fences.
   Do NOT add commentary."#;

/// Default prompt for splitting a transcript into chapters.
///
/// Written to `linter.txt` on first use when the file is absent. The
/// response contract (a JSON array of `{"filename", "content"}` records)
/// is what [`crate::pipeline::split`] parses.
pub const DEFAULT_LINTER_PROMPT: &str = r#"You are given the full Markdown transcript of a scanned set of notes. Split it into logical chapters.

Respond with ONLY a JSON array. Each element must be an object with exactly two string fields:
  "filename" — a short file-safe chapter name (lowercase, words joined by underscores, no extension)
  "content"  — the complete Markdown content of that chapter, verbatim from the transcript

Do not add fields, commentary, or wrap the JSON in ``` fences.

Transcript:

<<CONTENT>>"#;

/// A prompt template file with a single placeholder token.
///
/// Construction is cheap and does no I/O; the file is read inside
/// [`PromptTemplate::render`] so edits take effect immediately.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    path: PathBuf,
    placeholder: &'static str,
    default_text: &'static str,
}

impl PromptTemplate {
    /// The page-transcription template (`parser.txt` under `prompts_dir`).
    pub fn parser(prompts_dir: &Path) -> Self {
        Self {
            path: prompts_dir.join(PARSER_PROMPT_FILE),
            placeholder: IMAGE_PATH_PLACEHOLDER,
            default_text: DEFAULT_PARSER_PROMPT,
        }
    }

    /// The chapter-linting template (`linter.txt` under `prompts_dir`).
    pub fn linter(prompts_dir: &Path) -> Self {
        Self {
            path: prompts_dir.join(LINTER_PROMPT_FILE),
            placeholder: CONTENT_PLACEHOLDER,
            default_text: DEFAULT_LINTER_PROMPT,
        }
    }

    /// Path of the underlying template file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the built-in default to disk if the file does not exist yet.
    pub async fn ensure_exists(&self) -> Result<(), NotemillError> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.read_err(e))?
        {
            tokio::fs::write(&self.path, self.default_text)
                .await
                .map_err(NotemillError::io(&self.path))?;
        }
        Ok(())
    }

    /// Read the template fresh and substitute the placeholder with `value`.
    pub async fn render(&self, value: &str) -> Result<String, NotemillError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.read_err(e))?;
        Ok(text.replace(self.placeholder, value))
    }

    fn read_err(&self, source: std::io::Error) -> NotemillError {
        NotemillError::PromptRead {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_contain_their_placeholder() {
        assert!(DEFAULT_PARSER_PROMPT.contains(IMAGE_PATH_PLACEHOLDER));
        assert!(DEFAULT_LINTER_PROMPT.contains(CONTENT_PLACEHOLDER));
    }

    #[tokio::test]
    async fn ensure_exists_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let template = PromptTemplate::parser(dir.path());

        template.ensure_exists().await.unwrap();
        let on_disk = tokio::fs::read_to_string(template.path()).await.unwrap();
        assert_eq!(on_disk, DEFAULT_PARSER_PROMPT);

        // A user edit must survive a second ensure_exists.
        tokio::fs::write(template.path(), "custom <<IMAGEPATH>>")
            .await
            .unwrap();
        template.ensure_exists().await.unwrap();
        let edited = tokio::fs::read_to_string(template.path()).await.unwrap();
        assert_eq!(edited, "custom <<IMAGEPATH>>");
    }

    #[tokio::test]
    async fn render_substitutes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let template = PromptTemplate::parser(dir.path());
        template.ensure_exists().await.unwrap();

        let rendered = template.render("/tmp/report_page0.jpg").await.unwrap();
        assert!(rendered.contains("/tmp/report_page0.jpg"));
        assert!(!rendered.contains(IMAGE_PATH_PLACEHOLDER));
    }

    #[tokio::test]
    async fn render_reads_fresh_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let template = PromptTemplate::linter(dir.path());
        template.ensure_exists().await.unwrap();

        let first = template.render("text").await.unwrap();
        tokio::fs::write(template.path(), "edited: <<CONTENT>>")
            .await
            .unwrap();
        let second = template.render("text").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(second, "edited: text");
    }

    #[tokio::test]
    async fn render_missing_file_is_prompt_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let template = PromptTemplate::linter(dir.path());
        let err = template.render("text").await.unwrap_err();
        assert!(matches!(err, NotemillError::PromptRead { .. }));
    }
}
