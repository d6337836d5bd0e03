//! Application configuration
//!
//! Settings are read from TOML. Every section is optional and falls back to
//! the defaults below.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::DEFAULT_ALLOWED_EXTENSIONS;
use crate::ocr::layout_builder::{LineChain, LineClusterer, DEFAULT_LINE_THRESHOLD};
use crate::ocr::OcrBridge;
use crate::storage::DiskStorage;

pub const CONFIG_FILE_NAME: &str = "ocrlines.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub layout: LayoutSettings,
    pub detector: DetectorSettings,
    pub storage: StorageSettings,
    pub batch: BatchSettings,
}

/// Line reconstruction settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutSettings {
    /// Maximum anchor distance, in pixels, between fragments on one line
    pub line_threshold: f32,
    /// Which line member a new fragment is measured against
    pub chain: LineChain,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            line_threshold: DEFAULT_LINE_THRESHOLD,
            chain: LineChain::Last,
        }
    }
}

impl LayoutSettings {
    pub fn clusterer(&self) -> LineClusterer {
        LineClusterer::new(self.line_threshold).with_chain(self.chain)
    }
}

/// External OCR bridge settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSettings {
    pub python: PathBuf,
    pub script: PathBuf,
    pub lang: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            script: PathBuf::from("ocr/bridge/ocr_bridge.py"),
            lang: "en".to_string(),
        }
    }
}

impl DetectorSettings {
    pub fn bridge(&self) -> OcrBridge {
        OcrBridge::new()
            .with_python(self.python.clone())
            .with_script(self.script.clone())
            .with_lang(self.lang.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Root for per-item scratch directories
    pub upload_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl StorageSettings {
    pub fn storage(&self) -> DiskStorage {
        DiskStorage::new(self.upload_dir.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchSettings {
    /// Items processed concurrently
    pub jobs: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            jobs: 1,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Default config location in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ocrlines").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// An explicit path must exist; otherwise the platform default is used when
/// present, and built-in defaults when not.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        }
        _ => Ok(AppConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.layout.line_threshold, 18.0);
        assert_eq!(config.layout.chain, LineChain::Last);
        assert_eq!(config.detector.lang, "en");
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.batch.jobs, 1);
        assert_eq!(config.batch.allowed_extensions, vec!["png", "jpg", "jpeg"]);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[layout]\nline_threshold = 12.5\nchain = \"first\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.layout.line_threshold, 12.5);
        assert_eq!(config.layout.chain, LineChain::First);
        assert_eq!(config.detector, DetectorSettings::default());
        assert_eq!(config.batch, BatchSettings::default());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = AppConfig::default();
        config.batch.jobs = 4;

        save_config(&config, file.path()).unwrap();
        assert_eq!(load_config(file.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        assert!(resolve_config(Some(Path::new("/nonexistent/ocrlines.toml"))).is_err());
    }
}
