//! Declarative rule definitions.
//!
//! A [`Rule`] describes one invariant over one or more columns of a single
//! dataset. The invariant itself is a tagged [`RuleKind`] variant; the
//! executor interprets every kind generically, so adding a table only means
//! adding catalog entries.

use crate::ConfigurationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a rule's violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Any violation fails the run
    #[default]
    #[serde(alias = "error")]
    Blocking,
    /// Violations are reported but never fail the run
    #[serde(alias = "warning", alias = "info")]
    Advisory,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Blocking => f.write_str("blocking"),
            Severity::Advisory => f.write_str("advisory"),
        }
    }
}

/// Arithmetic relation between a result column and its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    /// result = a * b * ...
    #[default]
    Multiply,
    /// result = a + b + ...
    Add,
    /// result = a - b - ...
    Subtract,
    /// result = a / b / ...
    Divide,
}

impl ArithmeticOp {
    /// Infix symbol used in violation reasons.
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// A date bound: either a fixed calendar date or the run's start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateBound {
    /// Fixed calendar date
    Fixed(NaiveDate),
    /// The moment the run started
    RunTime,
}

impl FromStr for DateBound {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "now" | "today" | "run_time" | "current_date" => Ok(DateBound::RunTime),
            _ => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(DateBound::Fixed)
                .map_err(|_| ConfigurationError::InvalidDateBound(s.to_string())),
        }
    }
}

impl TryFrom<String> for DateBound {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateBound> for String {
    fn from(bound: DateBound) -> Self {
        bound.to_string()
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Fixed(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateBound::RunTime => f.write_str("now"),
        }
    }
}

/// Code to label mapping with case-insensitive, whitespace-insensitive keys.
///
/// Keys are stored in canonical form (trimmed, upper-cased), so `" m"` and
/// `"M"` address the same entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct EnumMapping {
    entries: BTreeMap<String, String>,
}

impl EnumMapping {
    /// Creates a mapping from `(code, label)` pairs.
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (Self::canonical_key(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// Canonical lookup form of a code: trimmed and upper-cased.
    pub fn canonical_key(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Looks up the label for a raw code.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries
            .get(&Self::canonical_key(code))
            .map(String::as_str)
    }

    /// Returns true if the raw code has a label.
    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no codes are mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, String>> for EnumMapping {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::new(map)
    }
}

impl From<EnumMapping> for BTreeMap<String, String> {
    fn from(mapping: EnumMapping) -> Self {
        mapping.entries
    }
}

/// Parameters of the latest-wins deduplication, shared by the standalone
/// rule and by catalog transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupSpec {
    /// Partition key
    pub key_columns: Vec<String>,
    /// Column ranked descending to pick the authoritative row
    pub recency_column: String,
    /// Secondary descending sort keys applied when recency ties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tie_breakers: Vec<String>,
}

impl DedupSpec {
    /// Every column the deduplication reads.
    pub fn columns(&self) -> Vec<&str> {
        self.key_columns
            .iter()
            .chain(std::iter::once(&self.recency_column))
            .chain(self.tie_breakers.iter())
            .map(String::as_str)
            .collect()
    }

    pub(crate) fn validate(&self, owner: &str) -> Result<(), ConfigurationError> {
        if self.key_columns.is_empty() {
            return Err(ConfigurationError::empty_columns(owner, "key_columns"));
        }
        if self.recency_column.trim().is_empty() {
            return Err(ConfigurationError::invalid_parameter(
                owner,
                "recency_column",
                "must name a column",
            ));
        }
        Ok(())
    }
}

/// The invariant a rule checks, with its kind-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Key columns must be non-null and unique
    KeyIntegrity {
        /// Columns forming the key
        key_columns: Vec<String>,
    },

    /// Text columns must not carry leading/trailing whitespace
    NoUnwantedWhitespace {
        /// Text columns to inspect
        columns: Vec<String>,
    },

    /// Discover observed codes that the mapping does not classify
    DomainMembership {
        /// Coded column
        column: String,
        /// Known codes and their canonical labels
        mapping: EnumMapping,
        /// Label unknown codes currently resolve to
        #[serde(default = "default_label")]
        default_label: String,
    },

    /// `result_column` must equal `op(operands)` within `tolerance`
    CrossFieldArithmetic {
        /// Column holding the derived value
        result_column: String,
        /// Operand columns, applied left to right
        operands: Vec<String>,
        /// Operation applied to the operands
        #[serde(default)]
        op: ArithmeticOp,
        /// Maximum absolute difference tolerated
        #[serde(default)]
        tolerance: f64,
        /// Operands and result are magnitudes that must be positive
        #[serde(default = "default_true")]
        require_positive: bool,
    },

    /// `earlier_column` must not be after any of `later_columns`
    DateOrder {
        /// Column expected to hold the earliest date
        earlier_column: String,
        /// Columns expected to hold later (or equal) dates
        later_columns: Vec<String>,
    },

    /// Column must lie within `[min, max]`
    DateRange {
        /// Date column
        column: String,
        /// Lower bound (inclusive)
        #[serde(default)]
        min: Option<DateBound>,
        /// Upper bound (inclusive)
        #[serde(default)]
        max: Option<DateBound>,
    },

    /// Report rows superseded by a more recent row with the same key
    LatestWinsDedup(DedupSpec),
}

fn default_label() -> String {
    "n/a".to_string()
}

fn default_true() -> bool {
    true
}

/// Kind of a violation: the kind of rule that produced it, or the synthetic
/// kind recorded when a rule could not be executed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Key integrity
    KeyIntegrity,
    /// Leading/trailing whitespace
    NoUnwantedWhitespace,
    /// Unclassified domain codes
    DomainMembership,
    /// Arithmetic consistency
    CrossFieldArithmetic,
    /// Temporal ordering
    DateOrder,
    /// Temporal bounds
    DateRange,
    /// Superseded duplicates
    LatestWinsDedup,
    /// The rule itself failed to run
    RuleExecutionError,
}

impl CheckKind {
    /// Snake-case name used in reports and catalogs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::KeyIntegrity => "key_integrity",
            CheckKind::NoUnwantedWhitespace => "no_unwanted_whitespace",
            CheckKind::DomainMembership => "domain_membership",
            CheckKind::CrossFieldArithmetic => "cross_field_arithmetic",
            CheckKind::DateOrder => "date_order",
            CheckKind::DateRange => "date_range",
            CheckKind::LatestWinsDedup => "latest_wins_dedup",
            CheckKind::RuleExecutionError => "rule_execution_error",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RuleKind {
    /// Returns the kind tag of this rule.
    pub fn check_kind(&self) -> CheckKind {
        match self {
            RuleKind::KeyIntegrity { .. } => CheckKind::KeyIntegrity,
            RuleKind::NoUnwantedWhitespace { .. } => CheckKind::NoUnwantedWhitespace,
            RuleKind::DomainMembership { .. } => CheckKind::DomainMembership,
            RuleKind::CrossFieldArithmetic { .. } => CheckKind::CrossFieldArithmetic,
            RuleKind::DateOrder { .. } => CheckKind::DateOrder,
            RuleKind::DateRange { .. } => CheckKind::DateRange,
            RuleKind::LatestWinsDedup(_) => CheckKind::LatestWinsDedup,
        }
    }

    /// Every column the rule reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            RuleKind::KeyIntegrity { key_columns } => {
                key_columns.iter().map(String::as_str).collect()
            }
            RuleKind::NoUnwantedWhitespace { columns } => {
                columns.iter().map(String::as_str).collect()
            }
            RuleKind::DomainMembership { column, .. } | RuleKind::DateRange { column, .. } => {
                vec![column.as_str()]
            }
            RuleKind::CrossFieldArithmetic {
                result_column,
                operands,
                ..
            } => std::iter::once(result_column)
                .chain(operands.iter())
                .map(String::as_str)
                .collect(),
            RuleKind::DateOrder {
                earlier_column,
                later_columns,
            } => std::iter::once(earlier_column)
                .chain(later_columns.iter())
                .map(String::as_str)
                .collect(),
            RuleKind::LatestWinsDedup(spec) => spec.columns(),
        }
    }

    /// Key columns naturally identifying offending rows, if the kind has any.
    pub fn natural_key(&self) -> &[String] {
        match self {
            RuleKind::KeyIntegrity { key_columns } => key_columns,
            RuleKind::LatestWinsDedup(spec) => &spec.key_columns,
            _ => &[],
        }
    }

    /// Checks the kind-specific parameters.
    pub fn validate(&self, rule_id: &str) -> Result<(), ConfigurationError> {
        match self {
            RuleKind::KeyIntegrity { key_columns } => {
                require_columns(rule_id, "key_columns", key_columns)
            }
            RuleKind::NoUnwantedWhitespace { columns } => {
                require_columns(rule_id, "columns", columns)
            }
            RuleKind::DomainMembership {
                column, mapping, ..
            } => {
                require_column(rule_id, "column", column)?;
                if mapping.is_empty() {
                    return Err(ConfigurationError::invalid_parameter(
                        rule_id,
                        "mapping",
                        "must contain at least one code",
                    ));
                }
                Ok(())
            }
            RuleKind::CrossFieldArithmetic {
                result_column,
                operands,
                tolerance,
                ..
            } => {
                require_column(rule_id, "result_column", result_column)?;
                if operands.len() < 2 {
                    return Err(ConfigurationError::invalid_parameter(
                        rule_id,
                        "operands",
                        "at least two operand columns are required",
                    ));
                }
                if !tolerance.is_finite() || *tolerance < 0.0 {
                    return Err(ConfigurationError::invalid_parameter(
                        rule_id,
                        "tolerance",
                        format!("must be a non-negative number, got {tolerance}"),
                    ));
                }
                Ok(())
            }
            RuleKind::DateOrder {
                earlier_column,
                later_columns,
            } => {
                require_column(rule_id, "earlier_column", earlier_column)?;
                require_columns(rule_id, "later_columns", later_columns)
            }
            RuleKind::DateRange { column, min, max } => {
                require_column(rule_id, "column", column)?;
                match (min, max) {
                    (None, None) => Err(ConfigurationError::invalid_parameter(
                        rule_id,
                        "min/max",
                        "at least one bound is required",
                    )),
                    (Some(DateBound::Fixed(lo)), Some(DateBound::Fixed(hi))) if lo > hi => {
                        Err(ConfigurationError::invalid_parameter(
                            rule_id,
                            "min",
                            format!("{lo} is after max {hi}"),
                        ))
                    }
                    _ => Ok(()),
                }
            }
            RuleKind::LatestWinsDedup(spec) => spec.validate(rule_id),
        }
    }
}

fn require_column(rule_id: &str, parameter: &str, column: &str) -> Result<(), ConfigurationError> {
    if column.trim().is_empty() {
        return Err(ConfigurationError::invalid_parameter(
            rule_id,
            parameter,
            "must name a column",
        ));
    }
    Ok(())
}

fn require_columns(
    rule_id: &str,
    parameter: &str,
    columns: &[String],
) -> Result<(), ConfigurationError> {
    if columns.is_empty() {
        return Err(ConfigurationError::empty_columns(rule_id, parameter));
    }
    columns
        .iter()
        .try_for_each(|c| require_column(rule_id, parameter, c))
}

/// A single declarative data quality rule.
///
/// # Example
///
/// ```rust
/// use quality_core::{Rule, RuleKind, Severity};
///
/// let rule = Rule {
///     id: "cst_id_unique".to_string(),
///     description: Some("Customer ids are unique and present".to_string()),
///     dataset: "silver.crm_cust_info".to_string(),
///     kind: RuleKind::KeyIntegrity {
///         key_columns: vec!["cst_id".to_string()],
///     },
///     severity: Severity::Blocking,
///     depends_on: None,
///     identify_by: vec![],
///     reference_dataset: None,
/// };
/// assert_eq!(rule.columns(), vec!["cst_id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier
    pub id: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Target dataset; inherited from the check group when omitted
    #[serde(default)]
    pub dataset: String,

    /// Invariant and its parameters
    #[serde(flatten)]
    pub kind: RuleKind,

    /// Whether violations fail the run
    #[serde(default)]
    pub severity: Severity,

    /// Transform whose output the rule reads instead of the raw dataset
    #[serde(default)]
    pub depends_on: Option<String>,

    /// Columns reported as the key of offending rows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identify_by: Vec<String>,

    /// Second dataset for cross-dataset checks
    #[serde(default)]
    pub reference_dataset: Option<String>,
}

impl Rule {
    /// Returns the kind tag of this rule.
    pub fn check_kind(&self) -> CheckKind {
        self.kind.check_kind()
    }

    /// Every column the rule reads, including its identifying columns.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = self.kind.columns();
        for column in &self.identify_by {
            if !columns.contains(&column.as_str()) {
                columns.push(column.as_str());
            }
        }
        columns
    }

    /// Columns used to identify offending rows in violations.
    pub fn key_columns(&self) -> &[String] {
        if self.identify_by.is_empty() {
            self.kind.natural_key()
        } else {
            &self.identify_by
        }
    }

    /// Returns true if violations of this rule fail the run.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}
