//! Error types for the data quality engine.
//!
//! The taxonomy follows where an error can surface:
//! - [`ConfigurationError`]: the catalog itself is malformed; fails a run at startup
//! - [`DataAccessError`]: a dataset cannot be read; fatal only for the rules reading it
//! - [`EvaluationError`]: a single row cannot be evaluated; reported as a violation

use thiserror::Error;

/// A malformed rule catalog.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Two rules or transforms share an identifier
    #[error("Duplicate identifier '{0}' in catalog")]
    DuplicateId(String),

    /// Identifier contains unsupported characters
    #[error("Invalid identifier '{0}': only letters, digits, '_', '.' and '-' are allowed")]
    InvalidId(String),

    /// A group or transform has no dataset
    #[error("Check group '{0}' does not name a dataset")]
    MissingDataset(String),

    /// A rule declares a dataset different from its group
    #[error("Rule '{rule}' targets dataset '{rule_dataset}' but its group targets '{group_dataset}'")]
    DatasetMismatch {
        /// Rule identifier
        rule: String,
        /// Dataset declared on the rule
        rule_dataset: String,
        /// Dataset declared on the group
        group_dataset: String,
    },

    /// A required column list is empty
    #[error("Rule '{rule}': '{parameter}' must list at least one column")]
    EmptyColumns {
        /// Rule or transform identifier
        rule: String,
        /// Offending parameter name
        parameter: String,
    },

    /// A rule parameter has an invalid value
    #[error("Rule '{rule}': invalid parameter '{parameter}': {message}")]
    InvalidParameter {
        /// Rule identifier
        rule: String,
        /// Offending parameter name
        parameter: String,
        /// What is wrong with it
        message: String,
    },

    /// `depends_on` names an undeclared transform
    #[error("Rule '{rule}' depends on unknown transform '{transform}'")]
    UnknownTransform {
        /// Rule identifier
        rule: String,
        /// Referenced transform identifier
        transform: String,
    },

    /// `depends_on` names a transform over another dataset
    #[error("Rule '{rule}' on '{dataset}' cannot depend on transform '{transform}' over '{transform_dataset}'")]
    TransformDatasetMismatch {
        /// Rule identifier
        rule: String,
        /// Rule dataset
        dataset: String,
        /// Referenced transform identifier
        transform: String,
        /// Dataset the transform reads
        transform_dataset: String,
    },

    /// Date bound could not be parsed
    #[error("Invalid date bound '{0}': expected YYYY-MM-DD or 'now'")]
    InvalidDateBound(String),
}

impl ConfigurationError {
    /// Creates a new invalid parameter error.
    pub fn invalid_parameter(
        rule: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            rule: rule.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates a new empty column list error.
    pub fn empty_columns(rule: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::EmptyColumns {
            rule: rule.into(),
            parameter: parameter.into(),
        }
    }
}

/// A dataset that could not be read by the accessor.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to read dataset '{dataset}': {message}")]
pub struct DataAccessError {
    /// Dataset identifier
    pub dataset: String,
    /// Failure details
    pub message: String,
}

impl DataAccessError {
    /// Creates a new data access error.
    pub fn new(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            message: message.into(),
        }
    }
}

/// A row that a rule could not evaluate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Value could not be coerced to the type the rule needs
    #[error("unparseable {expected} in column '{column}': '{value}'")]
    Unparseable {
        /// Column name
        column: String,
        /// Expected kind of value (e.g. "date", "number")
        expected: &'static str,
        /// Raw value as displayed
        value: String,
    },

    /// Arithmetic division by a zero operand
    #[error("unparseable arithmetic: division by zero in column '{column}'")]
    DivisionByZero {
        /// Divisor column
        column: String,
    },
}

impl EvaluationError {
    /// Creates a new unparseable value error.
    pub fn unparseable(
        column: impl Into<String>,
        expected: &'static str,
        value: impl ToString,
    ) -> Self {
        Self::Unparseable {
            column: column.into(),
            expected,
            value: value.to_string(),
        }
    }
}
