//! Configuration for a parser run.
//!
//! Every knob lives in [`ParserConfig`], built via its
//! [`ParserConfigBuilder`]. Keeping the whole run configuration in one
//! struct makes it trivial to log, to share with the CLI, and to diff two
//! runs to understand why their outputs differ.
//!
//! The config also carries the injected collaborators ([`ModelRunner`],
//! [`PageRasterizer`], [`BatchProgress`]) so tests can run the full batch
//! pipeline against deterministic doubles without spawning subprocesses or
//! binding pdfium.

use crate::error::NotemillError;
use crate::ollama::ModelRunner;
use crate::pipeline::raster::PageRasterizer;
use crate::progress::BatchProgress;
use crate::settings::Settings;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for one batch run of the page-to-chapter pipeline.
///
/// Built via [`ParserConfig::builder()`] or [`ParserConfig::default()`].
///
/// # Example
/// ```rust
/// use notemill::ParserConfig;
///
/// let config = ParserConfig::builder()
///     .notes_dir("notes")
///     .temp_dir("temp")
///     .vision_model("qwen2.5vl:7b")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParserConfig {
    /// Directory of source PDFs. Input-only; never written. Default: `notes`.
    pub notes_dir: PathBuf,

    /// Working directory for page images, transcripts, prompt audit files,
    /// and chapter files. Created if absent. Default: `temp`.
    pub temp_dir: PathBuf,

    /// Directory holding `parser.txt` and `linter.txt`. Default: `.`.
    pub prompts_dir: PathBuf,

    /// Explicitly requested vision model. Unlike the settings-sourced
    /// default, an explicit request is validated against the available list
    /// and errors out when absent — silently substituting a typo would be
    /// worse than failing.
    pub vision_model: Option<String>,

    /// Explicitly requested linter model; same validation as `vision_model`.
    pub linter_model: Option<String>,

    /// Per-model-call timeout in seconds. `None` (default) blocks until the
    /// external process exits.
    pub model_timeout_secs: Option<u64>,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// Page sizes vary wildly; capping the longest edge keeps memory bounded
    /// regardless of physical page size and matches the resolution sweet
    /// spot of current vision models.
    pub max_page_edge: u32,

    /// Pre-constructed model service. Defaults to [`crate::OllamaRunner`].
    pub runner: Option<Arc<dyn ModelRunner>>,

    /// Pre-constructed rasterizer. Defaults to [`crate::PdfiumRasterizer`].
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Progress callback. Defaults to a no-op.
    pub progress: Option<Arc<dyn BatchProgress>>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            notes_dir: PathBuf::from("notes"),
            temp_dir: PathBuf::from("temp"),
            prompts_dir: PathBuf::from("."),
            vision_model: None,
            linter_model: None,
            model_timeout_secs: None,
            max_page_edge: 2000,
            runner: None,
            rasterizer: None,
            progress: None,
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("notes_dir", &self.notes_dir)
            .field("temp_dir", &self.temp_dir)
            .field("prompts_dir", &self.prompts_dir)
            .field("vision_model", &self.vision_model)
            .field("linter_model", &self.linter_model)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("max_page_edge", &self.max_page_edge)
            .field("runner", &self.runner.as_ref().map(|_| "<dyn ModelRunner>"))
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"),
            )
            .finish()
    }
}

impl ParserConfig {
    /// Create a new builder for `ParserConfig`.
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    pub fn notes_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.notes_dir = dir.into();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    pub fn prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.prompts_dir = dir.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn linter_model(mut self, model: impl Into<String>) -> Self {
        self.config.linter_model = Some(model.into());
        self
    }

    pub fn model_timeout_secs(mut self, secs: u64) -> Self {
        self.config.model_timeout_secs = Some(secs);
        self
    }

    pub fn max_page_edge(mut self, px: u32) -> Self {
        self.config.max_page_edge = px.max(100);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ModelRunner>) -> Self {
        self.config.runner = Some(runner);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn BatchProgress>) -> Self {
        self.config.progress = Some(progress);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParserConfig, NotemillError> {
        let c = &self.config;
        if c.max_page_edge < 100 {
            return Err(NotemillError::InvalidConfig(format!(
                "max_page_edge must be ≥ 100 px, got {}",
                c.max_page_edge
            )));
        }
        if c.model_timeout_secs == Some(0) {
            return Err(NotemillError::InvalidConfig(
                "model_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        if c.notes_dir == c.temp_dir {
            return Err(NotemillError::InvalidConfig(
                "notes_dir and temp_dir must differ; the pipeline must never write into the notes directory".into(),
            ));
        }
        Ok(self.config)
    }
}

/// The vision/linter model pair for one run, resolved once and then immutable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ModelSelection {
    /// Model used for page transcription.
    pub vision: String,
    /// Model used for chapter splitting.
    pub linter: String,
}

impl ModelSelection {
    /// Resolve the model pair from explicit requests, settings defaults, and
    /// the available-models list.
    ///
    /// Explicit requests must match an installed model exactly
    /// ([`NotemillError::ModelNotAvailable`] otherwise). Settings-sourced
    /// defaults fall back to the first available model when absent from the
    /// list — that substitution is legitimately useful after a model is
    /// uninstalled, but it is also how a typo in settings.json silently runs
    /// the wrong model, so it is logged as a warning, not a debug line.
    pub fn resolve(
        config: &ParserConfig,
        settings: &Settings,
        available: &[String],
    ) -> Result<Self, NotemillError> {
        if available.is_empty() {
            return Err(NotemillError::NoModelsAvailable);
        }
        let vision = Self::pick(
            config.vision_model.as_deref(),
            settings.vision_default(),
            available,
            "vision",
        )?;
        let linter = Self::pick(
            config.linter_model.as_deref(),
            settings.linter_default(),
            available,
            "linter",
        )?;
        info!("Model selection: vision={vision} linter={linter}");
        Ok(Self { vision, linter })
    }

    fn pick(
        explicit: Option<&str>,
        configured: &str,
        available: &[String],
        role: &str,
    ) -> Result<String, NotemillError> {
        if let Some(requested) = explicit {
            return if available.iter().any(|m| m == requested) {
                Ok(requested.to_string())
            } else {
                Err(NotemillError::ModelNotAvailable {
                    model: requested.to_string(),
                    available: available.to_vec(),
                })
            };
        }

        if available.iter().any(|m| m == configured) {
            return Ok(configured.to_string());
        }

        let fallback = available[0].clone();
        warn!(
            "Configured {role} model '{configured}' is not in `ollama list`; \
             falling back to '{fallback}'"
        );
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available() -> Vec<String> {
        vec!["qwen2.5vl:7b".into(), "llama3.1:latest".into()]
    }

    #[test]
    fn builder_clamps_page_edge() {
        let config = ParserConfig::builder().max_page_edge(10).build().unwrap();
        assert_eq!(config.max_page_edge, 100);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ParserConfig::builder().model_timeout_secs(0).build();
        assert!(matches!(err, Err(NotemillError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_overlapping_dirs() {
        let err = ParserConfig::builder()
            .notes_dir("work")
            .temp_dir("work")
            .build();
        assert!(matches!(err, Err(NotemillError::InvalidConfig(_))));
    }

    #[test]
    fn explicit_model_must_be_installed() {
        let config = ParserConfig::builder()
            .vision_model("qwen2.5vl:72b")
            .build()
            .unwrap();
        let err = ModelSelection::resolve(&config, &Settings::default(), &available());
        assert!(matches!(err, Err(NotemillError::ModelNotAvailable { .. })));
    }

    #[test]
    fn explicit_models_win_over_settings() {
        let config = ParserConfig::builder()
            .vision_model("llama3.1:latest")
            .build()
            .unwrap();
        let settings = Settings {
            ollama_vision_model: Some("qwen2.5vl:7b".into()),
            ..Default::default()
        };
        let selection = ModelSelection::resolve(&config, &settings, &available()).unwrap();
        assert_eq!(selection.vision, "llama3.1:latest");
    }

    #[test]
    fn settings_default_used_when_installed() {
        let settings = Settings {
            ollama_model: "llama3.1:latest".into(),
            ..Default::default()
        };
        let selection =
            ModelSelection::resolve(&ParserConfig::default(), &settings, &available()).unwrap();
        assert_eq!(selection.vision, "llama3.1:latest");
        assert_eq!(selection.linter, "llama3.1:latest");
    }

    #[test]
    fn absent_settings_default_falls_back_to_first_available() {
        let settings = Settings {
            ollama_model: "gone:latest".into(),
            ..Default::default()
        };
        let selection =
            ModelSelection::resolve(&ParserConfig::default(), &settings, &available()).unwrap();
        assert_eq!(selection.vision, "qwen2.5vl:7b");
    }

    #[test]
    fn empty_available_list_is_fatal() {
        let err = ModelSelection::resolve(&ParserConfig::default(), &Settings::default(), &[]);
        assert!(matches!(err, Err(NotemillError::NoModelsAvailable)));
    }
}
