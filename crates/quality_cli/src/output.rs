use anyhow::Result;
use colored::*;
use quality_core::{RuleOutcome, RuleStatus, Severity, ValidationReport};
use std::io::Write;

use crate::ReportFormat;

pub fn write_report<W: Write>(
    report: &ValidationReport,
    format: ReportFormat,
    sample: usize,
    writer: &mut W,
) -> Result<()> {
    match format {
        ReportFormat::Json => quality_validator::write_json(report, writer)?,
        ReportFormat::Csv => quality_validator::write_csv(report, writer)?,
        ReportFormat::Text => write_text_report(report, sample, writer)?,
    }
    Ok(())
}

fn status_marker(outcome: &RuleOutcome) -> ColoredString {
    match outcome.status {
        RuleStatus::Passed => "✓".green().bold(),
        RuleStatus::Failed if outcome.is_blocking_failure() => "✗".red().bold(),
        RuleStatus::Failed => "!".yellow().bold(),
        RuleStatus::Errored => "✗".red().bold(),
        RuleStatus::Interrupted | RuleStatus::Skipped => "-".dimmed(),
    }
}

fn status_label(outcome: &RuleOutcome) -> ColoredString {
    let label = outcome.status.to_string();
    match outcome.status {
        RuleStatus::Passed => label.green(),
        RuleStatus::Failed if outcome.severity == Severity::Advisory => label.yellow(),
        RuleStatus::Failed | RuleStatus::Errored => label.red(),
        RuleStatus::Interrupted | RuleStatus::Skipped => label.dimmed(),
    }
}

fn write_text_report<W: Write>(
    report: &ValidationReport,
    sample: usize,
    w: &mut W,
) -> std::io::Result<()> {
    writeln!(w, "\n{}", "═".repeat(60))?;
    writeln!(w, "{}", "  DATA QUALITY REPORT".bold())?;
    writeln!(w, "{}", "═".repeat(60))?;
    writeln!(w, "  Catalog:  {}", report.catalog)?;
    writeln!(w, "  Snapshot: {}", report.snapshot)?;

    if report.is_pass() {
        writeln!(w, "\n{} {}", "✓".green().bold(), "Checks PASSED".green().bold())?;
    } else {
        writeln!(w, "\n{} {}", "✗".red().bold(), "Checks FAILED".red().bold())?;
    }
    if let Some(cause) = report.interruption {
        writeln!(w, "{} {}", "Partial run:".yellow().bold(), cause.to_string().yellow())?;
    }

    writeln!(w, "\n{}", "Rules:".bold())?;
    for outcome in &report.outcomes {
        writeln!(
            w,
            "  {} {:<32} {:<28} {:<12} {:>6}  {}",
            status_marker(outcome),
            outcome.rule_id,
            outcome.dataset,
            status_label(outcome),
            outcome.violation_count,
            outcome.severity
        )?;

        let shown = report.sample(&outcome.rule_id, sample);
        for violation in shown {
            let mut line = String::new();
            if let Some(row) = violation.row {
                line.push_str(&format!("[row {row}] "));
            }
            line.push_str(&violation.reason);
            if !violation.key.is_empty() {
                line.push_str(&format!(" (key: {})", violation.key_display()));
            }
            writeln!(w, "      - {}", line)?;
        }
        let hidden = outcome.violation_count.saturating_sub(shown.len());
        if hidden > 0 {
            writeln!(w, "      … {} more", hidden)?;
        }
    }

    let stats = &report.stats;
    writeln!(w, "\n{}", "Summary:".bold())?;
    writeln!(w, "  Rules:        {} total, {} evaluated, {} with violations", stats.rules_total, stats.rules_evaluated, stats.rules_failed)?;
    writeln!(w, "  Violations:   {}", report.total_violations())?;
    writeln!(w, "  Rows scanned: {}", stats.rows_scanned)?;
    writeln!(w, "  Duration:     {} ms", stats.duration_ms)?;
    writeln!(w, "{}", "═".repeat(60))?;
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use quality_core::{RuleBuilder, Violation};

    fn report() -> ValidationReport {
        let rule = RuleBuilder::no_unwanted_whitespace("cntry_trimmed", ["cntry"])
            .dataset("silver.erp_loc_a101")
            .identify_by(["cid"])
            .advisory()
            .build();
        let violations: Vec<Violation> = (0..3)
            .map(|i| {
                Violation::new(&rule, "unwanted leading/trailing whitespace in cntry")
                    .at_row(i)
                    .with_key("cid", format!("AW{i}").into())
            })
            .collect();
        let outcome = RuleOutcome {
            rule_id: rule.id.clone(),
            description: None,
            dataset: rule.dataset.clone(),
            kind: rule.check_kind(),
            severity: rule.severity,
            status: RuleStatus::Failed,
            violation_count: 3,
            violations,
            truncated: false,
            rows_scanned: 10,
            duration_ms: 1,
        };
        let started = "2024-06-01T00:00:00Z".parse().unwrap();
        ValidationReport::new("silver", "snap-1", started, started, None, vec![outcome])
    }

    #[test]
    fn test_text_report_samples_violations() {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        write_report(&report(), ReportFormat::Text, 2, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Checks PASSED"));
        assert!(text.contains("cntry_trimmed"));
        assert!(text.contains("[row 1] unwanted leading/trailing whitespace in cntry (key: cid=AW1)"));
        assert!(!text.contains("[row 2]"));
        assert!(text.contains("1 more"));
    }

    #[test]
    fn test_csv_report() {
        let mut buffer = Vec::new();
        write_report(&report(), ReportFormat::Csv, 0, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 4);
    }
}
