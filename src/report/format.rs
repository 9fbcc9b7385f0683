//! Human-readable renderings of a report.

use std::fmt::Write;

use super::Report;

/// One-line summary, e.g. `9 of 991 sequences anomalous (0.91%), threshold 0.120000`.
pub fn format_summary(report: &Report) -> String {
    format!(
        "{} of {} sequence{} anomalous ({:.2}%), threshold {:.6}",
        report.anomaly_count,
        report.total_sequences,
        if report.total_sequences == 1 { "" } else { "s" },
        report.anomaly_rate,
        report.threshold,
    )
}

/// Tabular detail listing for terminal output.
pub fn format_details(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} | {:<12} | {:<10} | Error", "Sequence", "Rows", "Severity");
    let _ = writeln!(out, "{:-<10}-|-{:-<12}-|-{:-<10}-|-{:-<12}", "", "", "", "");
    for a in &report.anomalies {
        let _ = writeln!(
            out,
            "{:<10} | {:<12} | {:<10} | {:.6}",
            a.sequence_index,
            a.rows.to_string(),
            a.severity.to_string(),
            a.error
        );
    }
    if report.anomalies.len() < report.anomaly_count {
        let _ = writeln!(
            out,
            "({} more not listed)",
            report.anomaly_count - report.anomalies.len()
        );
    }
    out
}

/// Body of an anomaly alert notification, listing the first `top` anomalies.
pub fn format_alert(report: &Report, top: usize) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "Home IoT Guardian - Anomaly Detection Alert");
    let _ = writeln!(body);
    let _ = writeln!(body, "SUMMARY:");
    let _ = writeln!(body, "--------");
    let _ = writeln!(body, "Total Sequences Analyzed: {}", report.total_sequences);
    let _ = writeln!(body, "Anomalies Detected: {}", report.anomaly_count);
    let _ = writeln!(body, "Anomaly Rate: {:.2}%", report.anomaly_rate);
    let _ = writeln!(body, "Threshold: {:.6}", report.threshold);

    if report.anomalies.is_empty() {
        return body;
    }

    let _ = writeln!(body);
    let _ = writeln!(body, "TOP ANOMALIES:");
    let _ = writeln!(body, "--------------");
    for (i, a) in report.anomalies.iter().take(top).enumerate() {
        let _ = writeln!(body, "Anomaly #{}:", i + 1);
        let _ = writeln!(body, "  - Sequence ID: {}", a.sequence_index);
        let _ = writeln!(body, "  - Error Score: {:.6}", a.error);
        let _ = writeln!(body, "  - Severity: {}", a.severity);
        let _ = writeln!(body, "  - Rows: {}", a.rows);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::anomaly::AnomalyRecord;
    use crate::detect::{RowRange, Severity};

    fn report(count: usize, total: usize) -> Report {
        let anomalies = (0..count)
            .map(|i| AnomalyRecord {
                sequence_index: i * 3,
                error: 0.3 + i as f64 * 0.01,
                severity: Severity::Critical,
                rows: RowRange::new(i * 3, i * 3 + 9),
                sample: Default::default(),
            })
            .collect();
        Report::assemble(total, anomalies, 0.12, None).unwrap()
    }

    #[test]
    fn test_summary_uses_two_decimals() {
        let summary = format_summary(&report(9, 991));
        assert_eq!(summary, "9 of 991 sequences anomalous (0.91%), threshold 0.120000");
        assert!(format_summary(&report(0, 1)).contains("1 sequence anomalous"));
    }

    #[test]
    fn test_alert_lists_top_anomalies() {
        let body = format_alert(&report(7, 50), 5);
        assert!(body.contains("Anomalies Detected: 7"));
        assert!(body.contains("Anomaly Rate: 14.00%"));
        assert!(body.contains("Anomaly #5:"));
        assert!(!body.contains("Anomaly #6:"));
        assert!(body.contains("  - Rows: 12-21"));
    }

    #[test]
    fn test_alert_without_anomalies_has_no_listing() {
        let body = format_alert(&report(0, 50), 5);
        assert!(body.contains("Anomalies Detected: 0"));
        assert!(!body.contains("TOP ANOMALIES"));
    }

    #[test]
    fn test_details_note_truncation() {
        let mut r = report(3, 10);
        r.anomalies.truncate(1);
        let table = format_details(&r);
        assert!(table.contains("(2 more not listed)"));
        assert!(table.contains("Critical"));
    }
}
