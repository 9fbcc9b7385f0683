//! Pretrained sequence reconstruction models.
//!
//! The pipeline only needs one capability from a model: given a batch of
//! sequences shaped `[batch, seq_length, features]`, return a reconstruction
//! of the same shape. Architecture and training live elsewhere.

pub mod dense;

use std::path::PathBuf;

use ndarray::{Array3, ArrayView3};
use thiserror::Error;

pub use dense::DenseAutoencoder;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model architecture: {0}")]
    Architecture(String),

    #[error("model returned shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model produced a non-finite reconstruction for sequence {sequence}")]
    NonFinite { sequence: usize },
}

/// A pretrained model that reconstructs its input.
///
/// Implementations must be deterministic and must not depend on call order:
/// one handle is loaded at startup and shared read-only by every run.
pub trait Reconstructor: Send + Sync {
    /// Reconstruct a `[batch, seq_length, features]` batch.
    fn reconstruct(&self, batch: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError>;

    /// Number of features per timestep the model expects, if it declares one.
    fn input_features(&self) -> Option<usize> {
        None
    }

    /// Short name used in logs.
    fn name(&self) -> &str {
        "model"
    }
}

impl<F> Reconstructor for F
where
    F: Fn(ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> + Send + Sync,
{
    fn reconstruct(&self, batch: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        self(batch)
    }
}
