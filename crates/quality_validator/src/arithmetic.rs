//! Cross-field arithmetic consistency.

use crate::dataset::{DataRow, cell};
use crate::evaluate::{RowCheck, ViolationSink, with_row_key};
use quality_core::{ArithmeticOp, DataValue, EvaluationError, Rule, Violation};

/// Reads a cell as a number.
///
/// Returns `Ok(None)` for nulls. Text is parsed after trimming; dates and
/// booleans are not numbers.
pub fn numeric(value: &DataValue, column: &str) -> Result<Option<f64>, EvaluationError> {
    match value {
        DataValue::Null => Ok(None),
        DataValue::Int(i) => Ok(Some(*i as f64)),
        DataValue::Float(f) if f.is_finite() => Ok(Some(*f)),
        DataValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| EvaluationError::unparseable(column, "number", value)),
        other => Err(EvaluationError::unparseable(column, "number", other)),
    }
}

/// Folds operands left to right with `op`.
///
/// # Errors
///
/// Returns [`EvaluationError::DivisionByZero`] naming the zero divisor.
pub fn apply(
    op: ArithmeticOp,
    operands: &[(&str, f64)],
) -> Result<f64, EvaluationError> {
    let mut iter = operands.iter();
    let Some(&(_, first)) = iter.next() else {
        return Ok(0.0);
    };

    iter.try_fold(first, |acc, &(column, value)| match op {
        ArithmeticOp::Multiply => Ok(acc * value),
        ArithmeticOp::Add => Ok(acc + value),
        ArithmeticOp::Subtract => Ok(acc - value),
        ArithmeticOp::Divide if value == 0.0 => Err(EvaluationError::DivisionByZero {
            column: column.to_string(),
        }),
        ArithmeticOp::Divide => Ok(acc / value),
    })
}

/// Returns true if `actual` and `expected` differ by more than `tolerance`,
/// ignoring floating point representation noise. Non-finite values always
/// exceed it.
pub fn exceeds_tolerance(actual: f64, expected: f64, tolerance: f64) -> bool {
    if !actual.is_finite() || !expected.is_finite() {
        return true;
    }
    let magnitude = actual.abs().max(expected.abs()).max(1.0);
    let noise = 4.0 * f64::EPSILON * magnitude;
    (actual - expected).abs() > tolerance + noise
}

fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

pub(crate) struct ArithmeticCheck<'a> {
    pub(crate) rule: &'a Rule,
    pub(crate) result_column: &'a str,
    pub(crate) operands: &'a [String],
    pub(crate) op: ArithmeticOp,
    pub(crate) tolerance: f64,
    pub(crate) require_positive: bool,
}

impl ArithmeticCheck<'_> {
    /// Every reason the row is inconsistent; unparseable reasons first.
    fn reasons(&self, row: &DataRow) -> Vec<String> {
        let mut unparseable = Vec::new();
        let mut other = Vec::new();
        let mut parsed: Vec<(&str, f64)> = Vec::with_capacity(self.operands.len() + 1);

        let columns = std::iter::once(self.result_column)
            .chain(self.operands.iter().map(String::as_str));
        for column in columns {
            match numeric(cell(row, column), column) {
                Ok(Some(value)) => {
                    if self.require_positive && value <= 0.0 {
                        other.push(format!("{column} must be positive, got {}", number(value)));
                    }
                    parsed.push((column, value));
                }
                Ok(None) => other.push(format!("{column} is null")),
                Err(e) => unparseable.push(e.to_string()),
            }
        }

        if parsed.len() == self.operands.len() + 1 {
            let (result, operands) = (parsed[0].1, &parsed[1..]);
            let expr: Vec<&str> = operands.iter().map(|(c, _)| *c).collect();
            let expr = expr.join(format!(" {} ", self.op.symbol()).as_str());
            match apply(self.op, operands) {
                Ok(expected) if !expected.is_finite() => {
                    unparseable.push(format!("unparseable arithmetic: {expr} overflows"));
                }
                Ok(expected) if exceeds_tolerance(result, expected, self.tolerance) => {
                    other.push(format!(
                        "{} = {} but {} = {}",
                        self.result_column,
                        number(result),
                        expr,
                        number(expected)
                    ));
                }
                Ok(_) => {}
                Err(e) => unparseable.push(e.to_string()),
            }
        }

        unparseable.extend(other);
        unparseable
    }
}

impl RowCheck for ArithmeticCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, sink: &mut ViolationSink) {
        let reasons = self.reasons(row);
        if reasons.is_empty() {
            return;
        }

        let mut violation = Violation::new(self.rule, reasons.join("; ")).at_row(index);
        for column in std::iter::once(self.result_column)
            .chain(self.operands.iter().map(String::as_str))
        {
            violation = violation.with_value(column, cell(row, column).clone());
        }
        sink.push(with_row_key(self.rule, row, violation));
    }
}
