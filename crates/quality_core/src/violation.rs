//! Violations produced while executing rules.

use crate::{CheckKind, DataValue, Rule, Severity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One instance of a rule failing for a row or a group of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Rule that produced the violation
    pub rule_id: String,

    /// Dataset the rule read
    pub dataset: String,

    /// Rule kind, or `rule_execution_error`
    pub kind: CheckKind,

    /// Severity inherited from the rule
    pub severity: Severity,

    /// 0-based index of the offending row in the evaluated stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,

    /// Identifying key values of the offending row(s)
    pub key: BTreeMap<String, DataValue>,

    /// Offending field values
    pub values: BTreeMap<String, DataValue>,

    /// Human-readable reason
    pub reason: String,
}

impl Violation {
    /// Creates a violation attributed to `rule` with no key or values.
    pub fn new(rule: &Rule, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            dataset: rule.dataset.clone(),
            kind: rule.check_kind(),
            severity: rule.severity,
            row: None,
            key: BTreeMap::new(),
            values: BTreeMap::new(),
            reason: reason.into(),
        }
    }

    /// Creates the synthetic violation recorded when a rule cannot run.
    ///
    /// Execution errors are always blocking: a rule that did not run cannot
    /// vouch for its dataset.
    pub fn execution_error(rule: &Rule, reason: impl Into<String>) -> Self {
        Self {
            kind: CheckKind::RuleExecutionError,
            severity: Severity::Blocking,
            ..Self::new(rule, reason)
        }
    }

    /// Sets the row index.
    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    /// Adds an identifying key value.
    pub fn with_key(mut self, column: impl Into<String>, value: DataValue) -> Self {
        self.key.insert(column.into(), value);
        self
    }

    /// Adds an offending field value.
    pub fn with_value(mut self, column: impl Into<String>, value: DataValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Returns true if this violation fails the run.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }

    /// Renders the key as `col=value, ...`.
    pub fn key_display(&self) -> String {
        join_pairs(&self.key)
    }

    /// Renders the values as `col=value, ...`.
    pub fn values_display(&self) -> String {
        join_pairs(&self.values)
    }
}

fn join_pairs(pairs: &BTreeMap<String, DataValue>) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule_id, self.reason)?;
        if !self.key.is_empty() {
            write!(f, " (key: {})", self.key_display())?;
        }
        if let Some(row) = self.row {
            write!(f, " at row {row}")?;
        }
        Ok(())
    }
}
