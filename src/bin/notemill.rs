//! CLI binary for notemill.
//!
//! A thin shim over the library crate: maps CLI flags to `ParserConfig`,
//! renders progress, and prints results. No pipeline logic lives here.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use notemill::{
    discover_documents, human_size, run_batch, BatchProgress, ChapterSplitter, ModelRunner,
    ModelSelection, NotemillError, OllamaRunner, ParserConfig, ProgressHandle, PromptTemplate,
    Settings,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the document batch, per-document log
/// lines above it, a live page counter in the bar message.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos}/{len} documents  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Parsing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgress for CliProgress {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
    }

    fn on_document_start(&self, doc_base: &str, _index: usize, _total: usize) {
        self.bar.set_message(format!("{doc_base}: rasterising"));
    }

    fn on_page_start(&self, doc_base: &str, page_index: usize, total_pages: usize) {
        self.bar.set_message(format!(
            "{doc_base}: page {}/{}",
            page_index + 1,
            total_pages
        ));
    }

    fn on_document_complete(&self, doc_base: &str, pages: usize, chapters: usize) {
        self.bar.println(format!(
            "  {} {:<24} {}",
            green("✓"),
            doc_base,
            dim(&format!("{pages} pages → {chapters} chapters")),
        ));
        self.bar.inc(1);
    }

    fn on_document_failed(&self, doc_base: &str, stage: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:<24} {}",
            red("✗"),
            doc_base,
            red(&format!("{stage}: {first_line}")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Parse every PDF in ./notes into chaptered Markdown under ./temp
  notemill run

  # Pick models explicitly and add a per-call timeout
  notemill run --vision-model qwen2.5vl:7b --linter-model llama3.1 --model-timeout 300

  # What is installed / what is waiting / when did the parser last run?
  notemill models
  notemill status

  # Re-run only the linter stage on an existing transcript
  notemill split lecture_4

SETUP:
  1. Install Ollama and a vision model:   ollama pull qwen2.5vl:7b
  2. Put scanned PDFs in ./notes
  3. Run:                                 notemill run

  libpdfium must be reachable via PDFIUM_LIB_PATH, the working directory,
  or the system library path. Prebuilt binaries:
  https://github.com/bblanchon/pdfium-binaries

FILES:
  settings.json   model defaults + last-run watermark (created on first run)
  parser.txt      vision prompt, <<IMAGEPATH>> placeholder (created on first run)
  linter.txt      linter prompt, <<CONTENT>> placeholder (created on first run)
  temp/           transcripts {doc}.md, chapters {name}.md, prompt audit files
"#;

/// Turn scanned PDF notes into chaptered Markdown using local Ollama models.
#[derive(Parser, Debug)]
#[command(
    name = "notemill",
    version,
    about = "Turn scanned PDF notes into chaptered Markdown using local Ollama models",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "NOTEMILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "NOTEMILL_QUIET")]
    quiet: bool,

    /// Path to settings.json.
    #[arg(long, global = true, env = "NOTEMILL_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline over every PDF in the notes directory.
    Run {
        /// Directory of source PDFs (read-only).
        #[arg(long, env = "NOTEMILL_NOTES_DIR", default_value = "notes")]
        notes_dir: PathBuf,

        /// Working directory for transcripts and chapters.
        #[arg(long, env = "NOTEMILL_TEMP_DIR", default_value = "temp")]
        temp_dir: PathBuf,

        /// Directory holding parser.txt and linter.txt.
        #[arg(long, env = "NOTEMILL_PROMPTS_DIR", default_value = ".")]
        prompts_dir: PathBuf,

        /// Vision model for page transcription (must be installed).
        #[arg(long, env = "NOTEMILL_VISION_MODEL")]
        vision_model: Option<String>,

        /// Linter model for chapter splitting (must be installed).
        #[arg(long, env = "NOTEMILL_LINTER_MODEL")]
        linter_model: Option<String>,

        /// Per-model-call timeout in seconds (default: no timeout).
        #[arg(long, env = "NOTEMILL_MODEL_TIMEOUT")]
        model_timeout: Option<u64>,

        /// Maximum rendered page dimension in pixels.
        #[arg(long, env = "NOTEMILL_MAX_PAGE_EDGE", default_value_t = 2000)]
        max_page_edge: u32,

        /// Output the run report as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "NOTEMILL_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List the models the Ollama service has installed.
    Models,

    /// Show the last-run watermark and the pending / produced files.
    Status {
        #[arg(long, env = "NOTEMILL_NOTES_DIR", default_value = "notes")]
        notes_dir: PathBuf,

        #[arg(long, env = "NOTEMILL_TEMP_DIR", default_value = "temp")]
        temp_dir: PathBuf,
    },

    /// Re-run only the chapter-splitting stage on an existing transcript.
    Split {
        /// Base name of the document (its transcript must exist in temp).
        doc_base: String,

        #[arg(long, env = "NOTEMILL_TEMP_DIR", default_value = "temp")]
        temp_dir: PathBuf,

        #[arg(long, env = "NOTEMILL_PROMPTS_DIR", default_value = ".")]
        prompts_dir: PathBuf,

        /// Linter model (must be installed).
        #[arg(long, env = "NOTEMILL_LINTER_MODEL")]
        linter_model: Option<String>,

        /// Per-model-call timeout in seconds.
        #[arg(long, env = "NOTEMILL_MODEL_TIMEOUT")]
        model_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Run {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run {
            ref notes_dir,
            ref temp_dir,
            ref prompts_dir,
            ref vision_model,
            ref linter_model,
            model_timeout,
            max_page_edge,
            json,
            no_progress: _,
        } => {
            run_command(
                &cli,
                notes_dir,
                temp_dir,
                prompts_dir,
                vision_model.as_deref(),
                linter_model.as_deref(),
                model_timeout,
                max_page_edge,
                json,
                show_progress,
            )
            .await
        }
        Command::Models => models_command().await,
        Command::Status {
            ref notes_dir,
            ref temp_dir,
        } => status_command(&cli, notes_dir, temp_dir).await,
        Command::Split {
            ref doc_base,
            ref temp_dir,
            ref prompts_dir,
            ref linter_model,
            model_timeout,
        } => {
            split_command(
                &cli,
                doc_base,
                temp_dir,
                prompts_dir,
                linter_model.as_deref(),
                model_timeout,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_command(
    cli: &Cli,
    notes_dir: &PathBuf,
    temp_dir: &PathBuf,
    prompts_dir: &PathBuf,
    vision_model: Option<&str>,
    linter_model: Option<&str>,
    model_timeout: Option<u64>,
    max_page_edge: u32,
    json: bool,
    show_progress: bool,
) -> Result<()> {
    let mut settings = Settings::load_or_init(&cli.settings)
        .await
        .context("Failed to load settings")?;

    if !cli.quiet && !json {
        let last = if settings.never_ran() {
            "never".to_string()
        } else {
            settings.last_ran_parser.clone()
        };
        eprintln!("{} last run: {}", cyan("◆"), dim(&last));
    }

    let mut builder = ParserConfig::builder()
        .notes_dir(notes_dir.clone())
        .temp_dir(temp_dir.clone())
        .prompts_dir(prompts_dir.clone())
        .max_page_edge(max_page_edge);
    if let Some(m) = vision_model {
        builder = builder.vision_model(m);
    }
    if let Some(m) = linter_model {
        builder = builder.linter_model(m);
    }
    if let Some(secs) = model_timeout {
        builder = builder.model_timeout_secs(secs);
    }
    if show_progress {
        let progress: ProgressHandle = CliProgress::new();
        builder = builder.progress(progress);
    }
    let config = builder.build().context("Invalid configuration")?;

    let report = run_batch(&config, &mut settings)
        .await
        .context("Batch run failed")?;

    // One explicit save at shutdown: watermark + resolved model selection.
    settings
        .save(&cli.settings)
        .await
        .context("Failed to save settings")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    if !cli.quiet {
        let s = &report.stats;
        let tick = if s.failed == 0 { green("✔") } else { cyan("⚠") };
        eprintln!(
            "{tick}  {}/{} documents  {} pages  {} chapters  {}ms",
            s.succeeded, s.documents, s.pages_transcribed, s.chapters_written, s.total_duration_ms
        );
        for doc in report.documents.iter().filter(|d| !d.succeeded()) {
            eprintln!(
                "{} {} failed during {}:",
                red("✗"),
                bold(&doc.doc_base),
                doc.failed_stage
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "run".into()),
            );
            if let Some(ref e) = doc.error {
                for line in e.lines() {
                    eprintln!("    {}", dim(line));
                }
            }
        }
    }
    Ok(())
}

async fn models_command() -> Result<()> {
    let runner = OllamaRunner::new();
    let models = runner
        .list_models()
        .await
        .context("Failed to list models")?;
    if models.is_empty() {
        anyhow::bail!("{}", NotemillError::NoModelsAvailable);
    }
    for model in &models {
        println!("{model}");
    }
    Ok(())
}

async fn status_command(cli: &Cli, notes_dir: &PathBuf, temp_dir: &PathBuf) -> Result<()> {
    let settings = Settings::load_or_init(&cli.settings)
        .await
        .context("Failed to load settings")?;
    println!("{}  {}", bold("Last parser run:"), settings.last_ran_parser);
    println!(
        "{}  vision={}  linter={}",
        bold("Default models: "),
        settings.vision_default(),
        settings.linter_default()
    );

    println!("\n{}", bold(&format!("Waiting in {}:", notes_dir.display())));
    match discover_documents(notes_dir).await {
        Ok(docs) if docs.is_empty() => println!("  (no PDFs)"),
        Ok(docs) => {
            let total: u64 = docs.iter().map(|d| d.size_bytes).sum();
            for doc in &docs {
                println!("  {:<32} {}", doc.base, dim(&human_size(doc.size_bytes)));
            }
            println!("  {} files, {}", docs.len(), human_size(total));
        }
        Err(e) => println!("  {}", red(&e.to_string())),
    }

    println!("\n{}", bold(&format!("Produced in {}:", temp_dir.display())));
    match notemill::notes::list_directory(temp_dir).await {
        Ok(rows) if rows.is_empty() => println!("  (empty)"),
        Ok(rows) => {
            for row in &rows {
                println!(
                    "  {:<32} {:<4} {:>10}  {}",
                    row.name,
                    row.extension,
                    row.size,
                    dim(&row.modified)
                );
            }
        }
        Err(_) => println!("  (no temp directory yet)"),
    }
    Ok(())
}

async fn split_command(
    cli: &Cli,
    doc_base: &str,
    temp_dir: &PathBuf,
    prompts_dir: &PathBuf,
    linter_model: Option<&str>,
    model_timeout: Option<u64>,
) -> Result<()> {
    let settings = Settings::load_or_init(&cli.settings)
        .await
        .context("Failed to load settings")?;
    let runner = match model_timeout {
        Some(secs) => OllamaRunner::with_timeout(secs),
        None => OllamaRunner::new(),
    };

    let mut builder = ParserConfig::builder().temp_dir(temp_dir.clone());
    if let Some(m) = linter_model {
        builder = builder.linter_model(m);
    }
    let config = builder.build().context("Invalid configuration")?;

    let available = runner
        .list_models()
        .await
        .context("Failed to list models")?;
    let models = ModelSelection::resolve(&config, &settings, &available)?;

    let template = PromptTemplate::linter(prompts_dir);
    template.ensure_exists().await?;

    let mut splitter = ChapterSplitter::new();
    let chapters = splitter
        .split(doc_base, temp_dir, &models.linter, &runner, &template)
        .await
        .with_context(|| format!("Splitting '{doc_base}' failed"))?;

    if chapters.is_empty() {
        eprintln!("{} linter produced zero chapters (transcript left intact)", cyan("⚠"));
    } else {
        for path in &chapters {
            println!("{}", path.display());
        }
        eprintln!("{} {} chapters written", green("✔"), chapters.len());
    }
    Ok(())
}
