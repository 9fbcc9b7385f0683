//! Error taxonomy for a pipeline run.

use thiserror::Error;

use crate::model::ModelError;

/// Every way a pipeline run can fail. A run either produces a whole
/// [`Report`](crate::report::Report) or one of these; there is no partial result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("input contains no usable data rows")]
    EmptyInput,

    #[error("insufficient data: {rows} usable rows, need at least {seq_length} for one sequence")]
    InsufficientData { rows: usize, seq_length: usize },

    #[error("insufficient data: no sequences were scored")]
    NoSequences,

    #[error("feature '{feature}' has zero or non-finite standard deviation")]
    DegenerateFeature { feature: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Stable, matchable classification of a [`PipelineError`] for host layers
/// that map failures to status codes or UI messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    EmptyInput,
    InsufficientData,
    DegenerateFeature,
    ModelUnavailable,
    InvalidConfig,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Schema { .. } => ErrorKind::Schema,
            PipelineError::EmptyInput => ErrorKind::EmptyInput,
            PipelineError::InsufficientData { .. } | PipelineError::NoSequences => {
                ErrorKind::InsufficientData
            }
            PipelineError::DegenerateFeature { .. } => ErrorKind::DegenerateFeature,
            PipelineError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            PipelineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// True for faults the operator must fix (configuration, model files),
    /// as opposed to problems with the uploaded data.
    pub fn is_operator_fault(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DegenerateFeature | ErrorKind::ModelUnavailable | ErrorKind::InvalidConfig
        )
    }

    /// Advice for whoever supplied the input.
    pub fn remediation(&self) -> &'static str {
        match self {
            PipelineError::Schema { .. } => {
                "Upload a flow export that includes all configured feature columns."
            }
            PipelineError::EmptyInput => "The file has no data. Provide a file with flow records.",
            PipelineError::InsufficientData { .. } | PipelineError::NoSequences => {
                "The file is too small to analyze. Add more rows so at least one full sequence can be formed."
            }
            PipelineError::DegenerateFeature { .. } => {
                "Fix the normalizer parameters: every feature needs a non-zero standard deviation."
            }
            PipelineError::ModelUnavailable(_) => {
                "The detection model could not be loaded or run. Check the model file and retry."
            }
            PipelineError::InvalidConfig(_) => "Fix the detector configuration and restart.",
        }
    }
}
