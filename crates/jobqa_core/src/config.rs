use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{QaError, Result};
use crate::pipeline::{Mode, TopK};

/// Weights and tokenizer for one model. Both or neither must be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelFiles {
    pub model: Option<PathBuf>,
    pub tokenizer: Option<PathBuf>,
}

impl ModelFiles {
    pub fn new(model: Option<PathBuf>, tokenizer: Option<PathBuf>) -> Self {
        Self { model, tokenizer }
    }

    /// `Ok(None)` when nothing is configured.
    pub fn paths(&self) -> Result<Option<(&Path, &Path)>> {
        match (&self.model, &self.tokenizer) {
            (Some(m), Some(t)) => Ok(Some((m.as_path(), t.as_path()))),
            (None, None) => Ok(None),
            _ => Err(QaError::Config(
                "model and tokenizer paths must both be provided".to_string(),
            )),
        }
    }

    /// Fields set in `other` replace ours.
    pub fn merge(&mut self, other: ModelFiles) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.tokenizer.is_some() {
            self.tokenizer = other.tokenizer;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub top_k: TopK,
    pub show_reasoning: bool,
    pub embedder: ModelFiles,
    pub qa: ModelFiles,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            top_k: TopK::default(),
            show_reasoning: true,
            embedder: ModelFiles::default(),
            qa: ModelFiles::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| QaError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| QaError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// `<config dir>/jobqa/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("jobqa").join("config.toml"))
    }

    /// An explicit path must exist; otherwise the default location is used
    /// when present, and built-in defaults when not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
