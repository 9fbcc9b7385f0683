//! TOML configuration for the detector.
//!
//! The `[pipeline]` section is the fitted, versioned input to every scan:
//! feature order, normalizer parameters, categorical vocabularies, window
//! length, threshold and severity bands. The `[model]` section says where
//! the pretrained weights and the offline-selected threshold live.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detect::anomaly::SeverityBands;
use crate::error::PipelineError;
use crate::features::{CategoricalFeature, FeatureStats, Normalizer};

/// Threshold used when neither the config nor a threshold file supplies one.
pub const DEFAULT_THRESHOLD: f64 = 0.12;

pub const DEFAULT_SEQ_LENGTH: usize = 10;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl GuardianConfig {
    /// Load configuration from a TOML file at `path`, then apply the
    /// threshold file if one is configured. Relative model paths are
    /// resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.model.resolve_paths(base);
        }
        config.apply_threshold_file()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Try, in order:
    /// 1. The path in the `GUARDIAN_CONFIG` environment variable.
    /// 2. `guardian.toml` in the working directory.
    /// 3. Compiled-in defaults.
    ///
    /// Defaults apply only when no config file is found. A file that exists
    /// but fails to load is an error.
    pub fn load_or_default() -> Result<Self> {
        if let Ok(env_path) = std::env::var("GUARDIAN_CONFIG") {
            let path = Path::new(&env_path);
            return Self::load(path)
                .with_context(|| format!("GUARDIAN_CONFIG points at {}", path.display()));
        }

        let local = Path::new("guardian.toml");
        if local.exists() {
            return Self::load(local);
        }

        debug!("No config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Replace `pipeline.threshold` with the value in `model.threshold_path`,
    /// if set.
    pub fn apply_threshold_file(&mut self) -> Result<()> {
        if let Some(path) = &self.model.threshold_path {
            let threshold = read_threshold(path)?;
            info!(path = %path.display(), threshold, "Loaded threshold");
            self.pipeline.threshold = threshold;
        }
        Ok(())
    }
}

/// Parse a threshold file: a single float, surrounding whitespace allowed.
pub fn read_threshold(path: &Path) -> Result<f64> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read threshold file: {}", path.display()))?;
    let value: f64 = content
        .trim()
        .parse()
        .with_context(|| format!("threshold file {} does not hold a number", path.display()))?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything a scan needs besides the model and the input rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows per sequence.
    pub seq_length: usize,
    /// Reconstruction error above which a sequence is anomalous.
    pub threshold: f64,
    /// Upper bound on sequences per model call.
    pub batch_size: usize,
    /// Keep at most this many anomaly details in a report. The anomaly count
    /// is never capped.
    pub max_details: Option<usize>,
    /// Numeric features in model column order, with fitted mean and std.
    pub features: Vec<FeatureStats>,
    /// Categorical columns expanded after the numeric features.
    pub categorical: Vec<CategoricalFeature>,
    pub severity: SeverityBands,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seq_length: DEFAULT_SEQ_LENGTH,
            threshold: DEFAULT_THRESHOLD,
            batch_size: 1024,
            max_details: None,
            features: ["orig_pkts", "resp_pkts", "orig_bytes", "resp_bytes"]
                .into_iter()
                .map(|name| FeatureStats::new(name, 0.0, 1.0))
                .collect(),
            categorical: Vec::new(),
            severity: SeverityBands::default(),
        }
    }
}

impl PipelineConfig {
    /// Check the configuration once, before any input is read.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.seq_length == 0 {
            return Err(PipelineError::InvalidConfig("seq_length must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        self.severity.validate()?;
        Normalizer::new(self.features.clone(), self.categorical.clone())?;
        Ok(())
    }

    /// Feature width after categorical expansion.
    pub fn feature_width(&self) -> usize {
        self.features.len() + self.categorical.iter().map(|c| c.vocabulary.len()).sum::<usize>()
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Location of the pretrained model and its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// JSON weights file for the dense autoencoder.
    pub path: PathBuf,
    /// Optional text file with the threshold chosen offline. Overrides
    /// `pipeline.threshold` when set.
    pub threshold_path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/autoencoder.json"),
            threshold_path: None,
        }
    }
}

impl ModelConfig {
    fn resolve_paths(&mut self, base: &Path) {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
        if let Some(p) = &self.threshold_path {
            if p.is_relative() {
                self.threshold_path = Some(base.join(p));
            }
        }
    }
}
