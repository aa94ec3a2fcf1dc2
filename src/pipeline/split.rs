//! Chapter splitting: linter call, record validation, chapter files.
//!
//! The linter model receives the full document transcript and answers with a
//! JSON array of `{"filename", "content"}` records. The response is
//! semi-structured output from a language model, so it is validated before
//! anything is written:
//!
//! - non-JSON or wrong-shape output → [`NotemillError::MalformedLinterOutput`]
//!   carrying the raw text, and zero chapter files;
//! - records with an empty `filename` are skipped (not an error);
//! - records whose `filename` contains path separators or `..` components
//!   are skipped too — rewriting such a name would break the contract that a
//!   chapter lands at `{filename}.md`, and writing outside the temp dir is
//!   not acceptable.
//!
//! Valid records are written verbatim: no blank-line framing, no fence
//! stripping of `content`. The exact prompt sent to the linter is saved to a
//! sidecar file first, so a bad split can always be reproduced by hand.
//!
//! One splitter instance lives for a whole batch run: it remembers which
//! chapter file names have been claimed, so two documents emitting the same
//! chapter name cannot silently overwrite each other (the later one is
//! namespaced under its source document).

use crate::error::NotemillError;
use crate::ollama::ModelRunner;
use crate::pipeline::accumulate::transcript_path;
use crate::pipeline::transcribe::strip_outer_fences;
use crate::prompts::PromptTemplate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One element of the linter's response array.
///
/// Both fields default to empty so a shape-valid array of objects never
/// fails the parse; validation of emptiness happens per record afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterRecord {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

/// Splits finished transcripts into chapter files. One per batch run.
#[derive(Debug, Default)]
pub struct ChapterSplitter {
    claimed: HashSet<String>,
}

impl ChapterSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split the transcript of `doc_base` into chapter files in `temp_dir`.
    ///
    /// Returns the paths actually written, in linter emission order. An
    /// empty (but well-formed) response is success with zero chapters.
    pub async fn split(
        &mut self,
        doc_base: &str,
        temp_dir: &Path,
        linter_model: &str,
        runner: &dyn ModelRunner,
        template: &PromptTemplate,
    ) -> Result<Vec<PathBuf>, NotemillError> {
        let transcript_file = transcript_path(temp_dir, doc_base);
        if !tokio::fs::try_exists(&transcript_file)
            .await
            .map_err(NotemillError::io(&transcript_file))?
        {
            return Err(NotemillError::MissingTranscript {
                path: transcript_file,
            });
        }
        let transcript = tokio::fs::read_to_string(&transcript_file)
            .await
            .map_err(NotemillError::io(&transcript_file))?;

        let prompt = template.render(&transcript).await?;

        // Audit sidecar before the call: if the linter misbehaves, the exact
        // prompt that provoked it is already on disk.
        let audit_path = temp_dir.join(format!("{doc_base}_linter_prompt.txt"));
        tokio::fs::write(&audit_path, &prompt)
            .await
            .map_err(NotemillError::io(&audit_path))?;

        let raw = runner.run(linter_model, &prompt).await?;
        let records = parse_linter_output(&raw)?;
        debug!("Linter returned {} records for '{doc_base}'", records.len());

        let mut written = Vec::new();
        for record in records {
            if !is_file_safe(&record.filename) {
                warn!(
                    "Skipping chapter with unusable filename {:?} from '{doc_base}'",
                    record.filename
                );
                continue;
            }
            let name = self.claim_name(doc_base, &record.filename);
            let path = temp_dir.join(format!("{name}.md"));
            tokio::fs::write(&path, &record.content)
                .await
                .map_err(NotemillError::io(&path))?;
            written.push(path);
        }

        info!("Split '{doc_base}' into {} chapters", written.len());
        Ok(written)
    }

    /// Resolve a chapter file name, namespacing on collision.
    ///
    /// The first claimant of `filename` keeps it unchanged; later claimants
    /// get `{doc_base}_{filename}`, then `_2`, `_3`, … — nothing is silently
    /// overwritten within one run.
    fn claim_name(&mut self, doc_base: &str, filename: &str) -> String {
        if self.claimed.insert(filename.to_string()) {
            return filename.to_string();
        }

        let namespaced = format!("{doc_base}_{filename}");
        let mut candidate = namespaced.clone();
        let mut n = 2usize;
        while !self.claimed.insert(candidate.clone()) {
            candidate = format!("{namespaced}_{n}");
            n += 1;
        }
        warn!("Chapter name '{filename}' already claimed; writing '{candidate}' instead");
        candidate
    }
}

/// Parse the linter's stdout into chapter records.
///
/// The same fence tolerance as page transcription applies first: local
/// models wrap JSON in ``` fences often enough that refusing to tolerate it
/// would make malformed output the common case. Stripping only fires on a
/// fully fenced payload, so it can never turn valid JSON invalid.
pub fn parse_linter_output(raw: &str) -> Result<Vec<ChapterRecord>, NotemillError> {
    let cleaned = strip_outer_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| NotemillError::MalformedLinterOutput {
        detail: e.to_string(),
        raw: raw.to_string(),
    })
}

/// A chapter filename is file-safe when it is non-empty, contains no path
/// separators, and has no `..` component.
fn is_file_safe(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && filename != ".."
        && filename != "."
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runner that must never be reached; `split` has to bail before any
    /// model call when there is no transcript to split.
    struct UnreachableRunner;

    #[async_trait::async_trait]
    impl ModelRunner for UnreachableRunner {
        async fn list_models(&self) -> Result<Vec<String>, NotemillError> {
            Ok(Vec::new())
        }

        async fn run(&self, model: &str, _input: &str) -> Result<String, NotemillError> {
            panic!("unexpected model call to '{model}'");
        }
    }

    #[tokio::test]
    async fn split_without_transcript_is_missing_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let template = PromptTemplate::linter(dir.path());
        let mut splitter = ChapterSplitter::new();

        let err = splitter
            .split("ghost", dir.path(), "some-model", &UnreachableRunner, &template)
            .await
            .unwrap_err();
        assert!(matches!(err, NotemillError::MissingTranscript { .. }));

        // Nothing was written either: no audit sidecar, no chapters.
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn parse_valid_records() {
        let raw = r##"[{"filename":"intro","content":"# Page 0"},{"filename":"","content":"ignored"}]"##;
        let records = parse_linter_output(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "intro");
        assert_eq!(records[1].filename, "");
    }

    #[test]
    fn parse_tolerates_fenced_json() {
        let raw = "```json\n[{\"filename\":\"intro\",\"content\":\"x\"}]\n```";
        let records = parse_linter_output(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "intro");
    }

    #[test]
    fn parse_missing_fields_default_to_empty() {
        let records = parse_linter_output(r#"[{}]"#).unwrap();
        assert_eq!(records[0].filename, "");
        assert_eq!(records[0].content, "");
    }

    #[test]
    fn parse_non_json_is_malformed() {
        let err = parse_linter_output("I refuse to answer in JSON.").unwrap_err();
        match err {
            NotemillError::MalformedLinterOutput { raw, .. } => {
                assert!(raw.contains("I refuse"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn parse_wrong_shape_is_malformed() {
        // An object instead of an array, and an array of strings.
        assert!(parse_linter_output(r#"{"filename":"x","content":"y"}"#).is_err());
        assert!(parse_linter_output(r#"["intro","body"]"#).is_err());
    }

    #[test]
    fn parse_empty_array_is_success() {
        assert!(parse_linter_output("[]").unwrap().is_empty());
    }

    #[test]
    fn file_safety_rules() {
        assert!(is_file_safe("intro"));
        assert!(is_file_safe("chapter_2"));
        assert!(!is_file_safe(""));
        assert!(!is_file_safe("a/b"));
        assert!(!is_file_safe("a\\b"));
        assert!(!is_file_safe(".."));
        assert!(!is_file_safe("."));
    }

    #[test]
    fn claim_name_first_wins_later_namespaced() {
        let mut splitter = ChapterSplitter::new();
        assert_eq!(splitter.claim_name("reportA", "notes"), "notes");
        assert_eq!(splitter.claim_name("reportB", "notes"), "reportB_notes");
        assert_eq!(splitter.claim_name("reportB", "notes"), "reportB_notes_2");
        assert_eq!(splitter.claim_name("reportC", "other"), "other");
    }
}
