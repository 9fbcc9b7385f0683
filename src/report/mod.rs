//! Scan reports -- aggregation, serialization, and the stored scan envelope.

pub mod format;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::anomaly::AnomalyRecord;
use crate::error::PipelineError;

/// Outcome of one pipeline run.
///
/// Field names on the wire match what the dashboard and the scan history
/// store read: `total_samples`, `anomalies_count`, `percentage`,
/// `threshold`, `details`. A report contains no timestamps or ids, so equal
/// inputs serialize to equal bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Number of sequences scored (not input rows).
    #[serde(rename = "total_samples")]
    pub total_sequences: usize,
    #[serde(rename = "anomalies_count")]
    pub anomaly_count: usize,
    /// `100 * anomaly_count / total_sequences`, unrounded.
    #[serde(rename = "percentage")]
    pub anomaly_rate: f64,
    pub threshold: f64,
    /// Flagged sequences in ascending sequence order.
    #[serde(rename = "details")]
    pub anomalies: Vec<AnomalyRecord>,
}

impl Report {
    /// Aggregate classified sequences into a report.
    ///
    /// `anomalies` may arrive in any order; `max_details` truncates the
    /// detail list after sorting without affecting the count.
    pub fn assemble(
        total_sequences: usize,
        mut anomalies: Vec<AnomalyRecord>,
        threshold: f64,
        max_details: Option<usize>,
    ) -> Result<Self, PipelineError> {
        if total_sequences == 0 {
            return Err(PipelineError::NoSequences);
        }

        anomalies.sort_by_key(|a| a.sequence_index);
        let anomaly_count = anomalies.len();
        if let Some(limit) = max_details {
            anomalies.truncate(limit);
        }

        Ok(Self {
            total_sequences,
            anomaly_count,
            anomaly_rate: 100.0 * anomaly_count as f64 / total_sequences as f64,
            threshold,
            anomalies,
        })
    }

    pub fn has_anomalies(&self) -> bool {
        self.anomaly_count > 0
    }

    /// Anomaly rate rounded to two decimal places, the precision used
    /// wherever a rate is shown.
    pub fn rounded_rate(&self) -> f64 {
        (self.anomaly_rate * 100.0).round() / 100.0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A report as handed to the history store: the report plus an id, the scan
/// time and the name of the scanned input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(flatten)]
    pub report: Report,
}

impl ScanRecord {
    pub fn new(source: impl Into<String>, report: Report) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            report,
        }
    }
}
