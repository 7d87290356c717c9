//! Configuration for the diagnosis pipeline
//!
//! Only artifact locations and the deep network's hyper-parameters are
//! configurable. Input sizes and the feature layout are fixed contracts with
//! the trained artifacts and live in constants instead.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::inference::ArtifactPaths;
use crate::utils::error::{DiagnosisError, Result};

/// Conventional location of the model directory
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Main configuration for diagnosis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// Deep (pixel) tier
    pub deep: DeepTierConfig,
    /// Lightweight (feature-vector) tier
    pub lightweight: LightweightTierConfig,
    /// Optional JSON advisory table merged over the built-in records
    #[serde(default)]
    pub advisory_path: Option<PathBuf>,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self::from_models_dir(DEFAULT_MODELS_DIR)
    }
}

impl DiagnosisConfig {
    /// Conventional layout under one directory:
    ///
    /// ```text
    /// <dir>/deep/model.mpk
    /// <dir>/deep/labels.json
    /// <dir>/lightweight/forest.json
    /// <dir>/lightweight/labels.json
    /// ```
    pub fn from_models_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            deep: DeepTierConfig {
                paths: ArtifactPaths::new(
                    dir.join("deep").join("model.mpk"),
                    dir.join("deep").join("labels.json"),
                )
                .with_record_extension("mpk"),
                ..DeepTierConfig::default()
            },
            lightweight: LightweightTierConfig {
                paths: ArtifactPaths::new(
                    dir.join("lightweight").join("forest.json"),
                    dir.join("lightweight").join("labels.json"),
                ),
                ..LightweightTierConfig::default()
            },
            advisory_path: None,
        }
    }

    /// Load from a JSON file and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: DiagnosisConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_advisory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.advisory_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.deep.base_filters == 0 {
            return Err(DiagnosisError::Config("deep.base_filters must be positive".into()));
        }
        if self.deep.hidden_units == 0 {
            return Err(DiagnosisError::Config("deep.hidden_units must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.deep.dropout_rate) {
            return Err(DiagnosisError::Config(format!(
                "deep.dropout_rate must be in [0, 1), got {}",
                self.deep.dropout_rate
            )));
        }
        Ok(())
    }
}

/// Deep tier artifacts and the architecture needed to load them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepTierConfig {
    /// Set to false to skip this tier entirely
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Weights record and label mapping
    pub paths: ArtifactPaths,
    /// Base number of convolutional filters
    pub base_filters: usize,
    /// Hidden units in the classifier head
    pub hidden_units: usize,
    /// Dropout rate the network was built with
    pub dropout_rate: f64,
}

impl Default for DeepTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: ArtifactPaths::new("models/deep/model.mpk", "models/deep/labels.json")
                .with_record_extension("mpk"),
            base_filters: 32,
            hidden_units: 256,
            dropout_rate: 0.3,
        }
    }
}

/// Lightweight tier artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightweightTierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Forest export and its parallel label list
    pub paths: ArtifactPaths,
}

impl Default for LightweightTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: ArtifactPaths::new(
                "models/lightweight/forest.json",
                "models/lightweight/labels.json",
            ),
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = DiagnosisConfig::default();
        assert_eq!(config.deep.paths.weights, PathBuf::from("models/deep/model.mpk"));
        assert_eq!(
            config.lightweight.paths.labels,
            PathBuf::from("models/lightweight/labels.json")
        );
        assert!(config.deep.enabled && config.lightweight.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_dropout() {
        let mut config = DiagnosisConfig::default();
        config.deep.dropout_rate = 1.0;
        assert!(matches!(config.validate(), Err(DiagnosisError::Config(_))));

        config.deep.dropout_rate = 0.2;
        config.deep.base_filters = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = DiagnosisConfig::from_models_dir(dir.path()).with_advisory_path("advice.json");
        config.save(&path).unwrap();

        let loaded = DiagnosisConfig::load(&path).unwrap();
        assert_eq!(loaded.deep.paths, config.deep.paths);
        assert_eq!(loaded.advisory_path, Some(PathBuf::from("advice.json")));
    }

    #[test]
    fn test_enabled_defaults_to_true() {
        let json = r#"{
            "deep": {
                "paths": {"weights": "d/model.mpk", "labels": "d/labels.json"},
                "base_filters": 16, "hidden_units": 64, "dropout_rate": 0.1
            },
            "lightweight": {
                "paths": {"weights": "l/forest.json", "labels": "l/labels.json"}
            }
        }"#;
        let config: DiagnosisConfig = serde_json::from_str(json).unwrap();
        assert!(config.deep.enabled);
        assert!(config.lightweight.enabled);
        assert_eq!(config.advisory_path, None);
    }
}
