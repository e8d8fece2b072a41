//! Report export.
//!
//! JSON carries the whole report. CSV flattens every retained violation into
//! one line so results can be loaded back into a table.

use crate::error::ExportError;
use quality_core::ValidationReport;
use std::io::Write;

/// Column order of the CSV export.
pub const CSV_HEADER: [&str; 8] = [
    "rule_id", "dataset", "kind", "severity", "row", "key", "values", "reason",
];

/// Serializes a report as pretty-printed JSON.
pub fn to_json(report: &ValidationReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Writes a report as pretty-printed JSON.
pub fn write_json<W: Write>(report: &ValidationReport, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    Ok(())
}

/// Writes every retained violation as one CSV record.
///
/// Keys and values are rendered as `column=value` pairs separated by `, `.
/// The `row` field is empty for group-level violations.
pub fn write_csv<W: Write>(report: &ValidationReport, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for violation in report.violations() {
        let row = violation.row.map(|r| r.to_string()).unwrap_or_default();
        let severity = violation.severity.to_string();
        csv.write_record([
            violation.rule_id.as_str(),
            violation.dataset.as_str(),
            violation.kind.as_str(),
            severity.as_str(),
            row.as_str(),
            violation.key_display().as_str(),
            violation.values_display().as_str(),
            violation.reason.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
