//! Persistent application settings (`settings.json`).
//!
//! A flat key-value file holding the run watermark and the default model
//! selection. The discipline is deliberately simple: read the whole file
//! once at startup, mutate the in-memory struct during the run, write the
//! whole file back with one explicit [`Settings::save`] call at shutdown.
//! There is no partial-field update support — only one pipeline run is
//! assumed active at a time.
//!
//! Keys that notemill does not recognise round-trip unchanged through the
//! flattened `extra` map, so other tools can share the file.

use crate::error::NotemillError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sentinel watermark value meaning the parser has never run.
pub const WATERMARK_NEVER: &str = "never";

/// Timestamp format used for the watermark and file listings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Model installed by default on a fresh setup; needs vision capabilities.
pub const RECOMMENDED_MODEL: &str = "qwen2.5vl:7b";

/// In-memory image of `settings.json`.
///
/// Field names match the on-disk keys one-to-one. `ollama_model` is the
/// legacy single-model key kept as a fallback default for installs that
/// predate the separate vision/linter selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Timestamp of the last fully-attempted parser run, or `"never"`.
    #[serde(default = "default_watermark")]
    pub last_ran_parser: String,

    /// Legacy single-model default.
    #[serde(default = "default_model")]
    pub ollama_model: String,

    /// Dedicated vision-model default; falls back to `ollama_model` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_vision_model: Option<String>,

    /// Dedicated linter-model default; falls back to `ollama_model` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_linter_model: Option<String>,

    /// Unrecognised keys, preserved verbatim across load/save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_watermark() -> String {
    WATERMARK_NEVER.to_string()
}

fn default_model() -> String {
    RECOMMENDED_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_ran_parser: default_watermark(),
            ollama_model: default_model(),
            ollama_vision_model: None,
            ollama_linter_model: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, creating the file with defaults if absent.
    ///
    /// Creating on first touch matches the application bootstrap behaviour:
    /// a fresh checkout works without any manual setup step.
    pub async fn load_or_init(path: &Path) -> Result<Self, NotemillError> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| settings_err(path, &e))?
        {
            let settings = Self::default();
            settings.save(path).await?;
            return Ok(settings);
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| settings_err(path, &e))?;
        serde_json::from_str(&raw).map_err(|e| settings_err(path, &e))
    }

    /// Write the whole settings file back to `path`.
    pub async fn save(&self, path: &Path) -> Result<(), NotemillError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| settings_err(path, &e))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| settings_err(path, &e))
    }

    /// Default vision model: dedicated key, then the legacy single-model key.
    pub fn vision_default(&self) -> &str {
        match self.ollama_vision_model.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => &self.ollama_model,
        }
    }

    /// Default linter model: dedicated key, then the legacy single-model key.
    pub fn linter_default(&self) -> &str {
        match self.ollama_linter_model.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => &self.ollama_model,
        }
    }

    /// True if the parser has never completed a run.
    pub fn never_ran(&self) -> bool {
        self.last_ran_parser == WATERMARK_NEVER
    }

    /// Parse the watermark into a timestamp, if it holds one.
    pub fn last_run(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDateTime::parse_from_str(&self.last_ran_parser, TIMESTAMP_FORMAT).ok()
    }

    /// Advance the watermark to the current local time.
    ///
    /// Called once per batch, after every document has been attempted — the
    /// watermark records "last attempted", not "last all-succeeded".
    pub fn touch_watermark(&mut self) {
        self.last_ran_parser = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    }

    /// Record the resolved model selection as the defaults for the next run.
    pub fn remember_models(&mut self, vision: &str, linter: &str) {
        self.ollama_vision_model = Some(vision.to_string());
        self.ollama_linter_model = Some(linter.to_string());
    }
}

fn settings_err(path: &Path, e: &dyn std::fmt::Display) -> NotemillError {
    NotemillError::Settings {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings::load_or_init(&path).await.unwrap();
        assert!(settings.never_ran());
        assert_eq!(settings.ollama_model, RECOMMENDED_MODEL);
        assert!(path.exists(), "bootstrap should write the file");
    }

    #[tokio::test]
    async fn round_trip_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(
            &path,
            r#"{"last_ran_parser": "2025-01-03 10:00:00", "theme": "dark"}"#,
        )
        .await
        .unwrap();

        let mut settings = Settings::load_or_init(&path).await.unwrap();
        settings.touch_watermark();
        settings.save(&path).await.unwrap();

        let reloaded = Settings::load_or_init(&path).await.unwrap();
        assert_eq!(
            reloaded.extra.get("theme"),
            Some(&serde_json::Value::String("dark".into()))
        );
        assert_ne!(reloaded.last_ran_parser, "2025-01-03 10:00:00");
    }

    #[test]
    fn legacy_model_feeds_both_defaults() {
        let settings = Settings {
            ollama_model: "llava".into(),
            ..Default::default()
        };
        assert_eq!(settings.vision_default(), "llava");
        assert_eq!(settings.linter_default(), "llava");
    }

    #[test]
    fn dedicated_keys_win_over_legacy() {
        let settings = Settings {
            ollama_model: "llava".into(),
            ollama_vision_model: Some("qwen2.5vl:7b".into()),
            ollama_linter_model: Some("llama3.1".into()),
            ..Default::default()
        };
        assert_eq!(settings.vision_default(), "qwen2.5vl:7b");
        assert_eq!(settings.linter_default(), "llama3.1");
    }

    #[test]
    fn empty_dedicated_key_falls_back_to_legacy() {
        let settings = Settings {
            ollama_model: "llava".into(),
            ollama_vision_model: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(settings.vision_default(), "llava");
    }

    #[test]
    fn watermark_parses_after_touch() {
        let mut settings = Settings::default();
        assert!(settings.last_run().is_none());
        settings.touch_watermark();
        assert!(settings.last_run().is_some());
        assert!(!settings.never_ran());
    }
}
