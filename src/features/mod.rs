//! Feature normalization -- fitted affine scaling plus fixed-vocabulary
//! one-hot expansion of categorical columns.

pub mod window;

use std::collections::HashSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PipelineError;
use crate::ingest::FlowRecord;

/// Fitted standardization parameters for one numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

impl FeatureStats {
    pub fn new(name: impl Into<String>, mean: f64, std: f64) -> Self {
        Self {
            name: name.into(),
            mean,
            std,
        }
    }

    pub fn normalize(&self, raw: f64) -> f64 {
        (raw - self.mean) / self.std
    }

    pub fn denormalize(&self, scaled: f64) -> f64 {
        scaled * self.std + self.mean
    }
}

/// A categorical column and the vocabulary it was one-hot encoded with at
/// training time. Indicator columns follow vocabulary order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFeature {
    pub name: String,
    pub vocabulary: Vec<String>,
}

impl CategoricalFeature {
    pub fn new<S: Into<String>>(name: impl Into<String>, vocabulary: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            vocabulary: vocabulary.into_iter().map(Into::into).collect(),
        }
    }

    /// Indicator column names, `<column>_<value>`.
    pub fn indicator_columns(&self) -> impl Iterator<Item = String> + '_ {
        self.vocabulary
            .iter()
            .map(move |value| format!("{}_{}", self.name, value))
    }
}

/// Applies a fitted transform to flow records, producing one row of the
/// model's feature matrix per record.
#[derive(Debug, Clone)]
pub struct Normalizer {
    numeric: Vec<FeatureStats>,
    categorical: Vec<CategoricalFeature>,
}

impl Normalizer {
    /// Validate the fitted parameters. Fails on zero or non-finite standard
    /// deviations, non-finite means, and duplicate output columns.
    pub fn new(
        numeric: Vec<FeatureStats>,
        categorical: Vec<CategoricalFeature>,
    ) -> Result<Self, PipelineError> {
        if numeric.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one numeric feature is required".into(),
            ));
        }
        for stat in &numeric {
            if stat.std == 0.0 || !stat.std.is_finite() {
                return Err(PipelineError::DegenerateFeature {
                    feature: stat.name.clone(),
                });
            }
            if !stat.mean.is_finite() {
                return Err(PipelineError::InvalidConfig(format!(
                    "feature '{}' has a non-finite mean",
                    stat.name
                )));
            }
        }

        let normalizer = Self { numeric, categorical };
        let mut seen = HashSet::new();
        for column in normalizer.column_names() {
            if !seen.insert(column.clone()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate feature column '{}'",
                    column
                )));
            }
        }
        Ok(normalizer)
    }

    pub fn numeric(&self) -> &[FeatureStats] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[CategoricalFeature] {
        &self.categorical
    }

    /// Names of the numeric columns a record must carry.
    pub fn required_columns(&self) -> Vec<String> {
        self.numeric.iter().map(|s| s.name.clone()).collect()
    }

    /// Output column names: numeric features, then each categorical
    /// column's indicators.
    pub fn column_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|s| s.name.clone())
            .chain(self.categorical.iter().flat_map(|c| c.indicator_columns()))
            .collect()
    }

    /// Feature width F of every normalized row.
    pub fn width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.vocabulary.len()).sum::<usize>()
    }

    /// Normalize one record. Unknown or missing categories produce all-zero
    /// indicators.
    pub fn normalize_record(&self, record: &FlowRecord) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.extend(
            self.numeric
                .iter()
                .zip(record.features())
                .map(|(stat, &raw)| stat.normalize(raw)),
        );
        for cat in &self.categorical {
            let value = record.raw(&cat.name);
            row.extend(
                cat.vocabulary
                    .iter()
                    .map(|v| if value == Some(v.as_str()) { 1.0 } else { 0.0 }),
            );
        }
        row
    }

    /// Normalize every record into an `[records, F]` matrix.
    pub fn normalize(&self, records: &[FlowRecord]) -> Array2<f64> {
        if let Some(first) = records.first() {
            for cat in &self.categorical {
                if first.get(&cat.name).is_none() {
                    warn!(column = %cat.name, "Categorical column absent from input, indicators set to zero");
                }
            }
        }

        let width = self.width();
        let mut matrix = Array2::zeros((records.len(), width));
        for (mut out, record) in matrix.rows_mut().into_iter().zip(records) {
            for (cell, value) in out.iter_mut().zip(self.normalize_record(record)) {
                *cell = value;
            }
        }
        matrix
    }

    /// Map a normalized numeric row back to raw units. Indicator columns are
    /// ignored.
    pub fn denormalize(&self, row: &[f64]) -> Vec<f64> {
        self.numeric
            .iter()
            .zip(row)
            .map(|(stat, &v)| stat.denormalize(v))
            .collect()
    }
}
