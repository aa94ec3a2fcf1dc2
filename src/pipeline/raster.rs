//! PDF rasterisation: render every page to a temporary JPEG via pdfium.
//!
//! ## Why files instead of in-memory images?
//!
//! The vision model is an external process that receives the image *path*
//! inside its prompt and resolves it locally, so each page must exist on
//! disk for the duration of its transcription. Page images are transient:
//! the orchestrator deletes each one right after its markdown is durably
//! appended, bounding temp-storage growth to one page at a time.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking-pool thread so the async workers never stall during rendering.

use crate::error::NotemillError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rendered page, materialised as a temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 0-based page index within the source document.
    pub page_index: usize,
    /// Path of the rendered JPEG, `{doc_base}_page{index}.jpg` in the temp dir.
    pub path: PathBuf,
}

/// Seam between the orchestrator and the rendering backend.
///
/// The output sequence is finite, in document page order, and restartable
/// from scratch only — a partially rendered document is re-rendered whole.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page of `pdf_path` into `temp_dir`.
    ///
    /// The caller owns deletion of the returned files.
    async fn rasterize(
        &self,
        pdf_path: &Path,
        doc_base: &str,
        temp_dir: &Path,
    ) -> Result<Vec<PageImage>, NotemillError>;
}

/// Production rasterizer backed by a dynamically bound pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    /// Longest-edge pixel cap for rendered pages.
    max_page_edge: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_page_edge: u32) -> Self {
        Self { max_page_edge }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        pdf_path: &Path,
        doc_base: &str,
        temp_dir: &Path,
    ) -> Result<Vec<PageImage>, NotemillError> {
        let pdf_path = pdf_path.to_path_buf();
        let doc_base = doc_base.to_string();
        let temp_dir = temp_dir.to_path_buf();
        let max_edge = self.max_page_edge;

        tokio::task::spawn_blocking(move || {
            rasterize_blocking(&pdf_path, &doc_base, &temp_dir, max_edge)
        })
        .await
        .map_err(|e| NotemillError::Internal(format!("Render task panicked: {e}")))?
    }
}

/// Bind to a pdfium library: explicit `PDFIUM_LIB_PATH`, then the current
/// directory, then the system library path.
fn bind_pdfium() -> Result<Pdfium, NotemillError> {
    let bindings = if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
    } else {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
    }
    .map_err(|e| NotemillError::PdfiumBinding(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    pdf_path: &Path,
    doc_base: &str,
    temp_dir: &Path,
    max_edge: u32,
) -> Result<Vec<PageImage>, NotemillError> {
    let source_err = |detail: String| NotemillError::SourceRead {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| source_err(format!("{e:?}")))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages ({})", total_pages, pdf_path.display());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_edge as i32)
        .set_maximum_height(max_edge as i32);

    let mut results = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| source_err(format!("page {}: {e:?}", idx)))?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| source_err(format!("rendering page {}: {e:?}", idx)))?;

        let image = bitmap.as_image();
        let path = temp_dir.join(page_image_name(doc_base, idx));
        image
            .to_rgb8()
            .save(&path)
            .map_err(|e| source_err(format!("saving page {} to '{}': {e}", idx, path.display())))?;

        debug!(
            "Rendered page {} → {}x{} px → {}",
            idx,
            image.width(),
            image.height(),
            path.display()
        );
        results.push(PageImage {
            page_index: idx,
            path,
        });
    }

    Ok(results)
}

/// File name of a page image: `{doc_base}_page{index}.jpg`.
pub fn page_image_name(doc_base: &str, page_index: usize) -> String {
    format!("{doc_base}_page{page_index}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_image_naming() {
        assert_eq!(page_image_name("report", 0), "report_page0.jpg");
        assert_eq!(page_image_name("lab_notes", 12), "lab_notes_page12.jpg");
    }
}
