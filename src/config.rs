use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SEGMENTATION_MODEL_FILENAME: &str = "segmentation.onnx";
const EMBEDDING_MODEL_FILENAME: &str = "embedding.onnx";

/// Application configuration: where to find models when the CLI flags are
/// not given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,
    pub segmentation_model_path: Option<PathBuf>,
    pub embedding_model_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            segmentation_model_path: None,
            embedding_model_path: None,
        }
    }
}

impl Config {
    /// Load config from file, or fall back to the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".diarize-cli"))
    }

    /// Get the default config file path
    pub fn default_config_file() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the default models directory
    pub fn default_models_dir() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("models"))
    }

    /// Get the segmentation model file path
    pub fn segmentation_model(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.segmentation_model_path {
            Ok(path.clone())
        } else {
            Ok(Self::default_models_dir()?.join(SEGMENTATION_MODEL_FILENAME))
        }
    }

    /// Get the embedding model file path
    pub fn embedding_model(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.embedding_model_path {
            Ok(path.clone())
        } else {
            Ok(Self::default_models_dir()?.join(EMBEDDING_MODEL_FILENAME))
        }
    }
}
