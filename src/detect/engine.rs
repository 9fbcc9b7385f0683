use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::detect::anomaly::AnomalyClassifier;
use crate::detect::score::score_windows;
use crate::error::PipelineError;
use crate::features::window::Windows;
use crate::features::Normalizer;
use crate::ingest::{load_records, FlowTable};
use crate::model::Reconstructor;
use crate::report::Report;

/// Validated detection context: the fitted normalizer, the threshold policy,
/// and a shared handle to the pretrained model.
///
/// Build one at startup and reuse it; `scan` borrows it immutably, so
/// concurrent scans from separate threads are fine as long as the model
/// backend is.
pub struct Detector<'m> {
    config: PipelineConfig,
    normalizer: Normalizer,
    classifier: AnomalyClassifier,
    model: &'m dyn Reconstructor,
}

impl<'m> Detector<'m> {
    pub fn new(config: PipelineConfig, model: &'m dyn Reconstructor) -> Result<Self, PipelineError> {
        config.validate()?;
        let normalizer = Normalizer::new(config.features.clone(), config.categorical.clone())?;
        let classifier = AnomalyClassifier::new(config.threshold, config.severity)?;

        if let Some(expected) = model.input_features() {
            if expected != normalizer.width() {
                return Err(PipelineError::InvalidConfig(format!(
                    "model '{}' expects {} features per timestep, configuration produces {}",
                    model.name(),
                    expected,
                    normalizer.width()
                )));
            }
        }

        Ok(Self {
            config,
            normalizer,
            classifier,
            model,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run one full pass over `table`: load, normalize, window, score,
    /// classify, assemble.
    pub fn scan(&self, table: &FlowTable) -> Result<Report, PipelineError> {
        let loaded = load_records(table, &self.normalizer.required_columns())?;
        info!(
            rows = table.len(),
            kept = loaded.records.len(),
            dropped = loaded.dropped_rows,
            "Loaded flow records"
        );

        let matrix = self.normalizer.normalize(&loaded.records);
        let windows = Windows::new(matrix.view(), self.config.seq_length)?;
        info!(
            sequences = windows.len(),
            seq_length = windows.seq_length(),
            features = windows.features(),
            "Built sequences"
        );

        let source_rows: Vec<usize> = loaded.records.iter().map(|r| r.source_row()).collect();
        let scored = score_windows(&windows, &source_rows, self.model, self.config.batch_size)?;

        let anomalies = self.classifier.flag(&scored, &loaded.records);
        let report = Report::assemble(
            scored.len(),
            anomalies,
            self.classifier.threshold(),
            self.config.max_details,
        )?;

        if report.anomaly_count > 0 {
            warn!(
                anomalies = report.anomaly_count,
                total = report.total_sequences,
                rate = report.anomaly_rate,
                "Anomalous sequences detected"
            );
        } else {
            info!(total = report.total_sequences, "No anomalies detected");
        }

        Ok(report)
    }
}

/// Single-call entry point: validate `config`, then scan `table` with `model`.
pub fn run_pipeline(
    table: &FlowTable,
    config: &PipelineConfig,
    model: &dyn Reconstructor,
) -> Result<Report, PipelineError> {
    Detector::new(config.clone(), model)?.scan(table)
}
