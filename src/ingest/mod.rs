//! Flow table loading -- header validation and typed flow records.

pub mod reader;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PipelineError;

/// In-memory tabular input: a header plus rows of raw cells, in file order.
#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl FlowTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are kept as-is; the loader drops them if they
    /// lack a required feature.
    pub fn push_row<T: ToString>(&mut self, cells: impl IntoIterator<Item = T>) {
        self.rows.push(cells.into_iter().map(|c| c.to_string()).collect());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A single cell value, typed on access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
    Missing,
}

impl<'a> FieldValue<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return FieldValue::Missing;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => FieldValue::Number(v),
            _ => FieldValue::Text(raw),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// One input row that passed validation.
///
/// `features` holds the configured numeric features in model column order;
/// `cells` keeps every original cell for reporting.
#[derive(Debug, Clone)]
pub struct FlowRecord {
    source_row: usize,
    header: Arc<[String]>,
    cells: Vec<String>,
    features: Vec<f64>,
}

impl FlowRecord {
    /// 0-based position of this row among the input's data rows.
    pub fn source_row(&self) -> usize {
        self.source_row
    }

    /// Raw numeric feature values, in configured order.
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn get(&self, column: &str) -> Option<FieldValue<'_>> {
        let idx = self.header.iter().position(|c| c == column)?;
        Some(
            self.cells
                .get(idx)
                .map(|c| FieldValue::parse(c))
                .unwrap_or(FieldValue::Missing),
        )
    }

    /// Trimmed raw cell for `column`, if the row has one.
    pub fn raw(&self, column: &str) -> Option<&str> {
        let idx = self.header.iter().position(|c| c == column)?;
        self.cells.get(idx).map(|c| c.trim())
    }

    /// Columns and raw cells in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .iter()
            .zip(self.cells.iter())
            .map(|(h, c)| (h.as_str(), c.trim()))
    }
}

/// Records that survived loading, plus how many rows were dropped.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub records: Vec<FlowRecord>,
    pub dropped_rows: usize,
}

/// Validate the header and turn rows into [`FlowRecord`]s.
///
/// Rows with a missing or non-numeric required feature are dropped and
/// counted; everything else keeps its original order.
pub fn load_records(table: &FlowTable, required: &[String]) -> Result<LoadOutcome, PipelineError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| table.column_index(name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }

    if table.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let indices: Vec<usize> = required
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect();
    let header: Arc<[String]> = table.columns().to_vec().into();

    let mut records = Vec::with_capacity(table.len());
    let mut dropped_rows = 0;
    for (source_row, row) in table.rows().iter().enumerate() {
        let features: Option<Vec<f64>> = indices
            .iter()
            .map(|&i| row.get(i).and_then(|cell| FieldValue::parse(cell).as_number()))
            .collect();

        match features {
            Some(features) => records.push(FlowRecord {
                source_row,
                header: Arc::clone(&header),
                cells: row.clone(),
                features,
            }),
            None => {
                debug!(source_row, "Dropping row with missing or non-numeric features");
                dropped_rows += 1;
            }
        }
    }

    if dropped_rows > 0 {
        warn!(
            dropped_rows,
            kept = records.len(),
            "Dropped rows with missing or non-numeric required features"
        );
    }

    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(LoadOutcome {
        records,
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<String> {
        vec!["orig_pkts".to_string(), "resp_pkts".to_string()]
    }

    #[test]
    fn test_field_value_parse() {
        assert_eq!(FieldValue::parse(" 12.5 "), FieldValue::Number(12.5));
        assert_eq!(FieldValue::parse("benign"), FieldValue::Text("benign"));
        assert_eq!(FieldValue::parse("  "), FieldValue::Missing);
        assert_eq!(FieldValue::parse("NaN"), FieldValue::Text("NaN"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let mut table = FlowTable::new(["ts", "orig_pkts"]);
        table.push_row(["1", "10"]);
        match load_records(&table, &required()) {
            Err(PipelineError::Schema { missing }) => assert_eq!(missing, vec!["resp_pkts"]),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let table = FlowTable::new(["orig_pkts", "resp_pkts"]);
        assert!(matches!(
            load_records(&table, &required()),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn test_bad_rows_are_dropped_and_counted() {
        let mut table = FlowTable::new(["orig_pkts", "label", "resp_pkts"]);
        table.push_row(["10", "benign", "8"]);
        table.push_row(["x", "benign", "8"]);
        table.push_row(["11", "malicious", ""]);
        table.push_row(vec!["12"]);
        table.push_row(["13", "benign", "9"]);

        let outcome = load_records(&table, &required()).unwrap();
        assert_eq!(outcome.dropped_rows, 3);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].source_row(), 0);
        assert_eq!(outcome.records[1].source_row(), 4);
        assert_eq!(outcome.records[1].features(), &[13.0, 9.0]);
        assert_eq!(outcome.records[1].get("label"), Some(FieldValue::Text("benign")));
        assert_eq!(outcome.records[1].get("nope"), None);
    }

    #[test]
    fn test_all_rows_dropped_is_empty_input() {
        let mut table = FlowTable::new(["orig_pkts", "resp_pkts"]);
        table.push_row(["-", "-"]);
        assert!(matches!(
            load_records(&table, &required()),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn test_record_iterates_in_header_order() {
        let mut table = FlowTable::new(["resp_pkts", "orig_pkts", "proto"]);
        table.push_row(["8", "10", " tcp "]);
        let outcome = load_records(&table, &required()).unwrap();
        let record = &outcome.records[0];
        // Features follow the required order, not the header order.
        assert_eq!(record.features(), &[10.0, 8.0]);
        let cols: Vec<_> = record.iter().collect();
        assert_eq!(cols, vec![("resp_pkts", "8"), ("orig_pkts", "10"), ("proto", "tcp")]);
        assert_eq!(record.raw("proto"), Some("tcp"));
    }
}
