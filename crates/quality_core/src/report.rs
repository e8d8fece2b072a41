//! Validation reports.
//!
//! A [`ValidationReport`] aggregates the outcome of one execution of a catalog
//! against a dataset snapshot. It is built once by the executor and is
//! read-only afterwards.

use crate::{CheckKind, Severity, Violation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Execution status of a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Ran to completion without violations
    Passed,
    /// Ran to completion with at least one violation
    Failed,
    /// Could not run; carries a `rule_execution_error` violation
    Errored,
    /// Stopped by cancellation before scanning all rows
    Interrupted,
    /// Never started because the run was cancelled
    Skipped,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuleStatus::Passed => "passed",
            RuleStatus::Failed => "failed",
            RuleStatus::Errored => "errored",
            RuleStatus::Interrupted => "interrupted",
            RuleStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Interruption {
    /// The caller cancelled the run
    Cancelled,
    /// The run exceeded its time budget
    TimedOut {
        /// Configured budget in milliseconds
        after_ms: u64,
    },
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::Cancelled => f.write_str("cancelled"),
            Interruption::TimedOut { after_ms } => write!(f, "timed out after {after_ms} ms"),
        }
    }
}

/// Outcome of one rule within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    /// Rule identifier
    pub rule_id: String,

    /// Rule description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Dataset the rule targets
    pub dataset: String,

    /// Rule kind
    pub kind: CheckKind,

    /// Rule severity
    pub severity: Severity,

    /// Execution status
    pub status: RuleStatus,

    /// Total number of violations found, including ones not retained
    pub violation_count: usize,

    /// Retained violations (bounded by the executor configuration)
    pub violations: Vec<Violation>,

    /// True if `violations` holds fewer entries than `violation_count`
    pub truncated: bool,

    /// Rows read by the rule
    pub rows_scanned: usize,

    /// Wall-clock evaluation time in milliseconds
    pub duration_ms: u64,
}

impl RuleOutcome {
    /// Returns true if this outcome fails the run.
    pub fn is_blocking_failure(&self) -> bool {
        self.violation_count > 0
            && (self.severity == Severity::Blocking
                || self.violations.iter().any(Violation::is_blocking))
    }
}

/// Per-rule line of a report summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    /// Rule identifier
    pub rule_id: String,
    /// Dataset
    pub dataset: String,
    /// Severity
    pub severity: Severity,
    /// Status
    pub status: RuleStatus,
    /// Total violations
    pub violation_count: usize,
}

/// Statistics about a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    /// Number of rules in the catalog
    pub rules_total: usize,

    /// Rules that ran to completion
    pub rules_evaluated: usize,

    /// Rules with at least one violation
    pub rules_failed: usize,

    /// Rows read across all rules
    pub rows_scanned: usize,

    /// Run duration in milliseconds
    pub duration_ms: u64,
}

/// Outcome of one execution of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Catalog name
    pub catalog: String,

    /// Dataset snapshot identifier
    pub snapshot: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub finished_at: DateTime<Utc>,

    /// True if not every rule ran to completion because of cancellation
    pub partial: bool,

    /// Cause of a partial run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interruption: Option<Interruption>,

    /// Per-rule outcomes in catalog order
    pub outcomes: Vec<RuleOutcome>,

    /// Run statistics
    pub stats: ValidationStats,
}

impl ValidationReport {
    /// Assembles a report and derives its statistics from the outcomes.
    pub fn new(
        catalog: impl Into<String>,
        snapshot: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        interruption: Option<Interruption>,
        outcomes: Vec<RuleOutcome>,
    ) -> Self {
        let stats = ValidationStats {
            rules_total: outcomes.len(),
            rules_evaluated: outcomes
                .iter()
                .filter(|o| matches!(o.status, RuleStatus::Passed | RuleStatus::Failed))
                .count(),
            rules_failed: outcomes.iter().filter(|o| o.violation_count > 0).count(),
            rows_scanned: outcomes.iter().map(|o| o.rows_scanned).sum(),
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        };

        let partial = interruption.is_some()
            || outcomes
                .iter()
                .any(|o| matches!(o.status, RuleStatus::Interrupted | RuleStatus::Skipped));

        Self {
            catalog: catalog.into(),
            snapshot: snapshot.into(),
            started_at,
            finished_at,
            partial,
            interruption,
            outcomes,
            stats,
        }
    }

    /// Returns true iff no blocking-severity violation was produced.
    pub fn is_pass(&self) -> bool {
        !self.outcomes.iter().any(RuleOutcome::is_blocking_failure)
    }

    /// Outcomes that fail the run.
    pub fn blocking_failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.is_blocking_failure())
    }

    /// Returns true if any rule could not be executed.
    pub fn has_execution_errors(&self) -> bool {
        self.outcomes.iter().any(|o| o.status == RuleStatus::Errored)
    }

    /// Looks up the outcome of a rule.
    pub fn outcome(&self, rule_id: &str) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule_id == rule_id)
    }

    /// Retained violations of a rule (empty for unknown rules).
    pub fn violations_for(&self, rule_id: &str) -> &[Violation] {
        self.outcome(rule_id)
            .map(|o| o.violations.as_slice())
            .unwrap_or(&[])
    }

    /// At most `n` violations of a rule, in detection order.
    pub fn sample(&self, rule_id: &str, n: usize) -> &[Violation] {
        let violations = self.violations_for(rule_id);
        &violations[..n.min(violations.len())]
    }

    /// Iterates over every retained violation in catalog order.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.outcomes.iter().flat_map(|o| o.violations.iter())
    }

    /// Total number of violations, including ones not retained.
    pub fn total_violations(&self) -> usize {
        self.outcomes.iter().map(|o| o.violation_count).sum()
    }

    /// Per-rule counts in catalog order.
    pub fn summary(&self) -> Vec<RuleSummary> {
        self.outcomes
            .iter()
            .map(|o| RuleSummary {
                rule_id: o.rule_id.clone(),
                dataset: o.dataset.clone(),
                severity: o.severity,
                status: o.status,
                violation_count: o.violation_count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rule, RuleKind};
    use pretty_assertions::assert_eq;

    fn rule(id: &str, severity: Severity) -> Rule {
        Rule {
            id: id.to_string(),
            description: None,
            dataset: "silver.erp_loc_a101".to_string(),
            kind: RuleKind::NoUnwantedWhitespace {
                columns: vec!["cntry".to_string()],
            },
            severity,
            depends_on: None,
            identify_by: vec![],
            reference_dataset: None,
        }
    }

    fn outcome(rule: &Rule, violations: usize) -> RuleOutcome {
        let violations: Vec<Violation> = (0..violations)
            .map(|i| Violation::new(rule, "dirty").at_row(i))
            .collect();
        RuleOutcome {
            rule_id: rule.id.clone(),
            description: None,
            dataset: rule.dataset.clone(),
            kind: rule.check_kind(),
            severity: rule.severity,
            status: if violations.is_empty() {
                RuleStatus::Passed
            } else {
                RuleStatus::Failed
            },
            violation_count: violations.len(),
            violations,
            truncated: false,
            rows_scanned: 10,
            duration_ms: 1,
        }
    }

    fn report(outcomes: Vec<RuleOutcome>) -> ValidationReport {
        let now = Utc::now();
        ValidationReport::new("silver", "snap", now, now, None, outcomes)
    }

    #[test]
    fn test_advisory_violations_pass() {
        let advisory = rule("cntry_ws", Severity::Advisory);
        let blocking = rule("cntry_ws_strict", Severity::Blocking);
        let report = report(vec![outcome(&advisory, 3), outcome(&blocking, 0)]);

        assert!(report.is_pass());
        assert_eq!(report.total_violations(), 3);
        assert_eq!(report.stats.rules_failed, 1);
        assert_eq!(report.stats.rows_scanned, 20);
        assert!(!report.partial);
    }

    #[test]
    fn test_blocking_violation_fails() {
        let blocking = rule("cntry_ws", Severity::Blocking);
        let report = report(vec![outcome(&blocking, 1)]);

        assert!(!report.is_pass());
        assert_eq!(report.blocking_failures().count(), 1);
    }

    #[test]
    fn test_execution_error_on_advisory_rule_fails() {
        let advisory = rule("cntry_ws", Severity::Advisory);
        let mut errored = outcome(&advisory, 0);
        errored.status = RuleStatus::Errored;
        errored.violation_count = 1;
        errored
            .violations
            .push(Violation::execution_error(&advisory, "boom"));

        let report = report(vec![errored]);
        assert!(!report.is_pass());
        assert!(report.has_execution_errors());
    }

    #[test]
    fn test_sample_and_summary() {
        let advisory = rule("cntry_ws", Severity::Advisory);
        let report = report(vec![outcome(&advisory, 5)]);

        assert_eq!(report.sample("cntry_ws", 2).len(), 2);
        assert_eq!(report.sample("cntry_ws", 50).len(), 5);
        assert!(report.violations_for("unknown").is_empty());

        let summary = report.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].violation_count, 5);
        assert_eq!(summary[0].status, RuleStatus::Failed);
    }

    #[test]
    fn test_skipped_marks_partial() {
        let advisory = rule("cntry_ws", Severity::Advisory);
        let mut skipped = outcome(&advisory, 0);
        skipped.status = RuleStatus::Skipped;

        let report = report(vec![skipped]);
        assert!(report.partial);
        assert_eq!(report.stats.rules_evaluated, 0);
    }
}
