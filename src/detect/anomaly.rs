//! Threshold and severity-band classification of scored sequences.
//!
//! Classification is a pure per-sequence function of the error, the
//! threshold, and the band boundaries; no state is carried between
//! sequences.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::detect::score::ScoredSequence;
use crate::detect::{RowRange, Severity};
use crate::error::PipelineError;
use crate::ingest::FlowRecord;

/// Upper bounds of the Low, Medium and High bands, as multiples of the
/// threshold. Anything above `high` is Critical; anything at or below the
/// threshold is not anomalous. Each bound belongs to its lower band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            low: 1.2,
            medium: 1.5,
            high: 2.0,
        }
    }
}

impl SeverityBands {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let finite = self.low.is_finite() && self.medium.is_finite() && self.high.is_finite();
        if !finite || !(1.0 < self.low && self.low < self.medium && self.medium < self.high) {
            return Err(PipelineError::InvalidConfig(format!(
                "severity bands must satisfy 1 < low < medium < high, got {} / {} / {}",
                self.low, self.medium, self.high
            )));
        }
        Ok(())
    }
}

/// A flagged sequence as reported to people.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(rename = "sequence_id")]
    pub sequence_index: usize,
    pub error: f64,
    pub severity: Severity,
    pub rows: RowRange,
    /// Original cells of the window's first row.
    #[serde(rename = "sample_data", default)]
    pub sample: SampleData,
}

/// Raw cells of one input row, in header order.
///
/// Serializes as a JSON object whose keys keep the header order. A header
/// name that repeats gets a `.1`, `.2`, ... suffix so no cell is lost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleData(Vec<(String, String)>);

impl SampleData {
    pub fn from_cells<'c>(cells: impl IntoIterator<Item = (&'c str, &'c str)>) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (column, value) in cells {
            let mut key = column.to_string();
            let mut suffix = 0;
            while entries.iter().any(|(k, _)| *k == key) {
                suffix += 1;
                key = format!("{}.{}", column, suffix);
            }
            entries.push((key, value.to_string()));
        }
        Self(entries)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SampleData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SampleData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SampleVisitor;

        impl<'de> Visitor<'de> for SampleVisitor {
            type Value = SampleData;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to cell values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SampleData, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    entries.push((k, v));
                }
                Ok(SampleData(entries))
            }
        }

        deserializer.deserialize_map(SampleVisitor)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyClassifier {
    threshold: f64,
    bands: SeverityBands,
}

impl AnomalyClassifier {
    pub fn new(threshold: f64, bands: SeverityBands) -> Result<Self, PipelineError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold must be a positive number, got {}",
                threshold
            )));
        }
        bands.validate()?;
        Ok(Self { threshold, bands })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn bands(&self) -> SeverityBands {
        self.bands
    }

    /// Severity for a reconstruction error, or `None` when the error does not
    /// exceed the threshold.
    ///
    /// An error exactly on a band bound belongs to the lower band: with the
    /// default bands, `1.2 * threshold` is Low, `1.5 * threshold` is Medium
    /// and `2.0 * threshold` is High. Bounds are compared as
    /// `error <= threshold * bound` so those products land on the bound.
    pub fn classify(&self, error: f64) -> Option<Severity> {
        let t = self.threshold;
        if error <= t {
            None
        } else if error <= t * self.bands.low {
            Some(Severity::Low)
        } else if error <= t * self.bands.medium {
            Some(Severity::Medium)
        } else if error <= t * self.bands.high {
            Some(Severity::High)
        } else {
            Some(Severity::Critical)
        }
    }

    /// Build anomaly records for every sequence above the threshold.
    ///
    /// `records` are the loaded rows the windows were built from; window `i`
    /// starts at `records[i]`.
    pub fn flag(&self, scored: &[ScoredSequence], records: &[FlowRecord]) -> Vec<AnomalyRecord> {
        scored
            .iter()
            .filter_map(|s| {
                let severity = self.classify(s.error)?;
                let sample = records
                    .get(s.index)
                    .map(|r| SampleData::from_cells(r.iter()))
                    .unwrap_or_default();
                Some(AnomalyRecord {
                    sequence_index: s.index,
                    error: s.error,
                    severity,
                    rows: s.rows,
                    sample,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(threshold: f64) -> AnomalyClassifier {
        AnomalyClassifier::new(threshold, SeverityBands::default()).unwrap()
    }

    #[test]
    fn test_band_table() {
        let c = classifier(0.1);
        assert_eq!(c.classify(0.05), None);
        assert_eq!(c.classify(0.1), None);
        assert_eq!(c.classify(0.11), Some(Severity::Low));
        assert_eq!(c.classify(0.13), Some(Severity::Medium));
        assert_eq!(c.classify(0.17), Some(Severity::High));
        assert_eq!(c.classify(0.2), Some(Severity::High));
        assert_eq!(c.classify(0.21), Some(Severity::Critical));
    }

    #[test]
    fn test_boundaries_belong_to_lower_band() {
        for threshold in [0.1, 0.12, 0.0375, 3.0] {
            let c = classifier(threshold);
            assert_eq!(c.classify(threshold * 1.2), Some(Severity::Low));
            assert_eq!(c.classify(threshold * 1.5), Some(Severity::Medium));
            assert_eq!(c.classify(threshold * 2.0), Some(Severity::High));
        }
    }

    #[test]
    fn test_severity_is_monotonic_in_error() {
        let c = classifier(0.12);
        let mut last: Option<Severity> = None;
        for step in 0..2000 {
            let error = step as f64 * 0.0002;
            let sev = c.classify(error);
            assert!(sev >= last, "severity decreased at error {}", error);
            last = sev;
        }
        assert_eq!(last, Some(Severity::Critical));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(AnomalyClassifier::new(0.0, SeverityBands::default()).is_err());
        assert!(AnomalyClassifier::new(f64::NAN, SeverityBands::default()).is_err());
        let inverted = SeverityBands {
            low: 1.5,
            medium: 1.2,
            high: 2.0,
        };
        assert!(AnomalyClassifier::new(0.1, inverted).is_err());
        let below_one = SeverityBands {
            low: 0.9,
            ..SeverityBands::default()
        };
        assert!(below_one.validate().is_err());
    }

    #[test]
    fn test_flag_skips_normal_sequences() {
        let c = classifier(1.0);
        let scored = vec![
            ScoredSequence { index: 0, error: 0.5, rows: RowRange::new(0, 9) },
            ScoredSequence { index: 1, error: 3.0, rows: RowRange::new(1, 10) },
            ScoredSequence { index: 2, error: 1.0, rows: RowRange::new(2, 11) },
        ];
        let flagged = c.flag(&scored, &[]);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].sequence_index, 1);
        assert_eq!(flagged[0].severity, Severity::Critical);
        assert!(flagged[0].sample.is_empty());
    }

    #[test]
    fn test_sample_keeps_header_order_and_repeated_columns() {
        let sample = SampleData::from_cells([
            ("ts", "1634567890"),
            ("proto", "tcp"),
            ("label", "benign"),
            ("proto", "udp"),
            ("label", "malicious"),
        ]);
        let keys: Vec<&str> = sample.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ts", "proto", "label", "proto.1", "label.1"]);
        assert_eq!(sample.get("proto"), Some("tcp"));
        assert_eq!(sample.get("proto.1"), Some("udp"));
        assert_eq!(sample.len(), 5);

        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"ts":"1634567890","proto":"tcp","label":"benign","proto.1":"udp","label.1":"malicious"}"#
        );
        let back: SampleData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}
