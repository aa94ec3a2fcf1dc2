//! The pipeline orchestrator: sequences rasterise → transcribe → accumulate
//! → split across a batch of documents.
//!
//! ## Failure policy
//!
//! Every per-document error is caught at the document boundary, recorded in
//! the [`RunReport`] with the stage it occurred in and the full diagnostic,
//! and the batch continues — one bad PDF must not block the rest. Only
//! startup work (temp dir, prompt bootstrap, model resolution) aborts the
//! whole run.
//!
//! ## Concurrency
//!
//! Documents are processed one at a time, pages within a document one at a
//! time. Each step blocks on the external model service, which is GPU-bound
//! and serialises requests internally; running calls concurrently would add
//! contention without adding throughput.
//!
//! ## Temp-image lifecycle
//!
//! A page image is deleted immediately after its markdown is durably
//! appended, so temp-storage growth is bounded by one page. When a document
//! fails mid-transcription, the not-yet-consumed images are removed
//! best-effort; the partially accumulated transcript stays on disk for
//! manual recovery.

use crate::config::{ModelSelection, ParserConfig};
use crate::error::NotemillError;
use crate::notes::{discover_documents, SourceDocument};
use crate::ollama::{ModelRunner, OllamaRunner};
use crate::pipeline::accumulate::TranscriptAccumulator;
use crate::pipeline::raster::{PageImage, PageRasterizer, PdfiumRasterizer};
use crate::pipeline::split::ChapterSplitter;
use crate::pipeline::transcribe::transcribe_page;
use crate::progress::{BatchProgress, NoopBatchProgress};
use crate::prompts::PromptTemplate;
use crate::report::{BatchStats, DocumentReport, RunReport, Stage};
use crate::settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Run the full page-to-chapter pipeline over every PDF in the notes dir.
///
/// `settings` provides the default model selection and receives the updated
/// watermark and the resolved models; persisting it (one explicit
/// [`Settings::save`]) is the caller's job, after this returns.
///
/// # Errors
/// Returns `Err` only for startup failures (unusable temp dir, unreadable
/// prompts, no models available, explicitly requested model missing).
/// Per-document failures are reported inside the `Ok(RunReport)`.
pub async fn run_batch(
    config: &ParserConfig,
    settings: &mut Settings,
) -> Result<RunReport, NotemillError> {
    let started = Instant::now();

    let runner: Arc<dyn ModelRunner> = config.runner.clone().unwrap_or_else(|| {
        Arc::new(match config.model_timeout_secs {
            Some(secs) => OllamaRunner::with_timeout(secs),
            None => OllamaRunner::new(),
        })
    });
    let rasterizer: Arc<dyn PageRasterizer> = config
        .rasterizer
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumRasterizer::new(config.max_page_edge)));
    let progress: Arc<dyn BatchProgress> = config
        .progress
        .clone()
        .unwrap_or_else(|| Arc::new(NoopBatchProgress));

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .map_err(NotemillError::io(&config.temp_dir))?;

    let parser_template = PromptTemplate::parser(&config.prompts_dir);
    let linter_template = PromptTemplate::linter(&config.prompts_dir);
    parser_template.ensure_exists().await?;
    linter_template.ensure_exists().await?;

    let available = runner.list_models().await?;
    let models = ModelSelection::resolve(config, settings, &available)?;
    settings.remember_models(&models.vision, &models.linter);

    let documents = discover_documents(&config.notes_dir).await?;
    info!(
        "Batch start: {} documents in {}",
        documents.len(),
        config.notes_dir.display()
    );
    progress.on_batch_start(documents.len());

    let mut splitter = ChapterSplitter::new();
    let mut reports = Vec::with_capacity(documents.len());
    let mut stats = BatchStats {
        documents: documents.len(),
        ..Default::default()
    };

    for (index, doc) in documents.iter().enumerate() {
        progress.on_document_start(&doc.base, index, documents.len());
        let ctx = DocumentContext {
            config,
            runner: runner.as_ref(),
            rasterizer: rasterizer.as_ref(),
            progress: progress.as_ref(),
            models: &models,
            parser_template: &parser_template,
            linter_template: &linter_template,
        };

        match process_document(doc, &ctx, &mut splitter).await {
            Ok((pages, chapters)) => {
                stats.succeeded += 1;
                stats.pages_transcribed += pages;
                stats.chapters_written += chapters.len();
                progress.on_document_complete(&doc.base, pages, chapters.len());
                reports.push(DocumentReport {
                    doc_base: doc.base.clone(),
                    pages,
                    chapters,
                    failed_stage: None,
                    error: None,
                });
            }
            Err(DocumentFailure {
                stage,
                error: e,
                pages,
            }) => {
                stats.failed += 1;
                stats.pages_transcribed += pages;
                let detail = e.to_string();
                error!("Document '{}' failed during {stage}: {detail}", doc.base);
                progress.on_document_failed(&doc.base, &stage.to_string(), &detail);
                reports.push(DocumentReport {
                    doc_base: doc.base.clone(),
                    pages,
                    chapters: Vec::new(),
                    failed_stage: Some(stage),
                    error: Some(detail),
                });
            }
        }
    }

    // The watermark reflects "last attempted", not "last all-succeeded":
    // it advances even when every document failed.
    settings.touch_watermark();
    stats.total_duration_ms = started.elapsed().as_millis() as u64;
    progress.on_batch_complete(stats.succeeded, stats.failed);
    info!(
        "Batch complete: {}/{} documents, {} pages, {} chapters, {}ms",
        stats.succeeded,
        stats.documents,
        stats.pages_transcribed,
        stats.chapters_written,
        stats.total_duration_ms
    );

    Ok(RunReport {
        documents: reports,
        stats,
        watermark: settings.last_ran_parser.clone(),
    })
}

/// Borrowed collaborators for one document's run.
struct DocumentContext<'a> {
    config: &'a ParserConfig,
    runner: &'a dyn ModelRunner,
    rasterizer: &'a dyn PageRasterizer,
    progress: &'a dyn BatchProgress,
    models: &'a ModelSelection,
    parser_template: &'a PromptTemplate,
    linter_template: &'a PromptTemplate,
}

/// A per-document failure: the stage it died in, the error, and how many
/// pages had already been durably appended.
struct DocumentFailure {
    stage: Stage,
    error: NotemillError,
    pages: usize,
}

/// Run one document through the full pipeline.
///
/// State machine: Discovered → Rasterizing → Transcribing(0..N) →
/// Accumulated → Splitting → Done, with any error short-circuiting into the
/// returned `DocumentFailure`.
async fn process_document(
    doc: &SourceDocument,
    ctx: &DocumentContext<'_>,
    splitter: &mut ChapterSplitter,
) -> Result<(usize, Vec<PathBuf>), DocumentFailure> {
    let fail = |stage: Stage, pages: usize| {
        move |error: NotemillError| DocumentFailure {
            stage,
            error,
            pages,
        }
    };

    let pages = ctx
        .rasterizer
        .rasterize(&doc.path, &doc.base, &ctx.config.temp_dir)
        .await
        .map_err(fail(Stage::Rasterize, 0))?;
    ctx.progress.on_pages_rasterized(&doc.base, pages.len());

    let mut accumulator = TranscriptAccumulator::create(&ctx.config.temp_dir, &doc.base)
        .await
        .map_err(fail(Stage::Transcribe, 0))?;

    let total_pages = pages.len();
    for (position, page) in pages.iter().enumerate() {
        ctx.progress
            .on_page_start(&doc.base, page.page_index, total_pages);

        let result = async {
            let markdown = transcribe_page(
                ctx.runner,
                &ctx.models.vision,
                ctx.parser_template,
                &page.path,
            )
            .await?;
            accumulator.append(page.page_index, &markdown).await?;
            Ok::<usize, NotemillError>(markdown.len())
        }
        .await;

        match result {
            Ok(markdown_len) => {
                // The page's markdown is durable; its image has served its
                // purpose and is removed whatever happens to later pages.
                remove_page_image(page).await;
                ctx.progress
                    .on_page_complete(&doc.base, page.page_index, total_pages, markdown_len);
            }
            Err(e) => {
                let appended = accumulator.pages_written();
                // Slice by loop position: a rasterizer's page_index values
                // are not trusted to match it.
                cleanup_page_images(&pages[position..]).await;
                return Err(fail(Stage::Transcribe, appended)(e));
            }
        }
    }

    let chapters = splitter
        .split(
            &doc.base,
            &ctx.config.temp_dir,
            &ctx.models.linter,
            ctx.runner,
            ctx.linter_template,
        )
        .await
        .map_err(fail(Stage::Split, total_pages))?;

    Ok((total_pages, chapters))
}

async fn remove_page_image(page: &PageImage) {
    if let Err(e) = tokio::fs::remove_file(&page.path).await {
        warn!(
            "Could not delete page image '{}': {e}",
            page.path.display()
        );
    }
}

/// Best-effort removal of the not-yet-consumed page images of a failed
/// document; page images are never retained.
async fn cleanup_page_images(pages: &[PageImage]) {
    for page in pages {
        remove_page_image(page).await;
    }
}
