//! Home IoT Guardian -- sequence-based anomaly detection for IoT network flows.
//!
//! This crate turns time-ordered flow records into fixed-length feature
//! sequences, scores each sequence by the reconstruction error of a
//! pretrained autoencoder, and reports the sequences whose error exceeds a
//! fixed threshold, ranked into severity bands.

pub mod config;
pub mod detect;
pub mod error;
pub mod features;
pub mod ingest;
pub mod model;
pub mod report;

pub use config::{GuardianConfig, PipelineConfig};
pub use detect::engine::{run_pipeline, Detector};
pub use detect::Severity;
pub use error::{ErrorKind, PipelineError};
pub use ingest::FlowTable;
pub use model::{DenseAutoencoder, ModelError, Reconstructor};
pub use report::{Report, ScanRecord};
