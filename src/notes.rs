//! Source-document discovery and directory listings.
//!
//! The notes directory is input-only: notemill never writes to it. Discovery
//! picks up regular `*.pdf` files (case-insensitive) and sorts them by file
//! name so batch order is deterministic across runs. Everything else in the
//! directory is ignored at debug level — stray `.DS_Store` files must not
//! show up as per-document failures.

use crate::error::NotemillError;
use crate::settings::TIMESTAMP_FORMAT;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A PDF discovered in the notes directory, immutable once discovered.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    /// Full path to the PDF.
    pub path: PathBuf,
    /// File name without extension; used to name the transcript and to
    /// group page images back to their document.
    pub base: String,
    /// Size in bytes, for listings.
    pub size_bytes: u64,
}

/// Scan `notes_dir` for source PDFs, sorted by file name.
pub async fn discover_documents(notes_dir: &Path) -> Result<Vec<SourceDocument>, NotemillError> {
    let mut entries = tokio::fs::read_dir(notes_dir)
        .await
        .map_err(NotemillError::io(notes_dir))?;

    let mut documents = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(NotemillError::io(notes_dir))?
    {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(NotemillError::io(&path))?;
        if !metadata.is_file() {
            continue;
        }
        if !has_pdf_extension(&path) {
            debug!("Ignoring non-PDF file: {}", path.display());
            continue;
        }
        let base = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                debug!("Ignoring file with unusable name: {}", path.display());
                continue;
            }
        };
        documents.push(SourceDocument {
            path,
            base,
            size_bytes: metadata.len(),
        });
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(documents)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Render a byte count the way the status listing shows it:
/// KB below one MiB, MB above, two decimals.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// One row of a directory listing (the `status` view).
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub extension: String,
    pub size: String,
    pub modified: String,
}

/// List the regular files in `dir` as display-ready rows, sorted by name.
pub async fn list_directory(dir: &Path) -> Result<Vec<FileEntry>, NotemillError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(NotemillError::io(dir))?;

    let mut rows = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(NotemillError::io(dir))? {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(NotemillError::io(&path))?;
        if !metadata.is_file() {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Local>::from(t).format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();

        rows.push(FileEntry {
            name,
            extension,
            size: human_size(metadata.len()),
            modified,
        });
    }

    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
}
