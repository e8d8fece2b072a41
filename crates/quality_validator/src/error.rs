//! Error types for rule execution and report export.

use quality_core::DataAccessError;
use thiserror::Error;

/// Reasons a rule could not run to completion.
///
/// Every variant ends up as a single `rule_execution_error` violation on the
/// rule's outcome; the rest of the run is unaffected.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The accessor failed to describe or stream the dataset
    #[error(transparent)]
    Access(#[from] DataAccessError),

    /// The rule references columns the dataset does not have
    #[error("dataset '{dataset}' has no column(s): {}", columns.join(", "))]
    MissingColumns {
        dataset: String,
        columns: Vec<String>,
    },

    /// The evaluation thread panicked
    #[error("rule evaluation panicked: {0}")]
    Panicked(String),
}

impl RuleError {
    /// Creates a new missing columns error.
    pub fn missing_columns(dataset: impl Into<String>, columns: &[&str]) -> Self {
        Self::MissingColumns {
            dataset: dataset.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV encoding failed
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed
    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying writer failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
