//! Generic rule evaluation.
//!
//! Every rule kind is a [`RowCheck`]: it observes rows one at a time in scan
//! order and may emit violations while observing or once the scan ends. The
//! driver in [`evaluate`] owns the scan loop, so cancellation, row counting
//! and violation retention behave identically for every kind.

use crate::accessor::RowStream;
use crate::dataset::{DataRow, DataSet, cell};
use crate::{arithmetic, domain, format, integrity, reconcile, temporal};
use chrono::NaiveDateTime;
use quality_core::{DataAccessError, DataValue, Rule, RuleKind, Violation};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-run inputs shared by every rule.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Start of the run; the value of `now` date bounds
    pub run_time: NaiveDateTime,
    /// Checked between rows
    pub cancel: CancellationToken,
    /// Maximum violations retained per rule
    pub max_retained: usize,
}

impl EvalContext {
    /// A context with no cancellation and no retention limit.
    pub fn new(run_time: NaiveDateTime) -> Self {
        Self {
            run_time,
            cancel: CancellationToken::new(),
            max_retained: usize::MAX,
        }
    }
}

/// Collects violations, retaining at most `limit` while counting all of them.
#[derive(Debug)]
pub struct ViolationSink {
    retained: Vec<Violation>,
    count: usize,
    limit: usize,
}

impl ViolationSink {
    /// Creates a sink retaining at most `limit` violations.
    pub fn new(limit: usize) -> Self {
        Self {
            retained: Vec::new(),
            count: 0,
            limit,
        }
    }

    /// Records a violation.
    pub fn push(&mut self, violation: Violation) {
        self.count += 1;
        if self.retained.len() < self.limit {
            self.retained.push(violation);
        }
    }

    /// Number of violations recorded, retained or not.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns true if some violations were dropped.
    pub fn truncated(&self) -> bool {
        self.count > self.retained.len()
    }

    /// Retained violations in detection order.
    pub fn into_violations(self) -> Vec<Violation> {
        self.retained
    }
}

/// One rule kind's evaluation state.
pub(crate) trait RowCheck {
    fn observe(&mut self, index: usize, row: &DataRow, sink: &mut ViolationSink);

    /// Called once after the last observed row, including after interruption.
    fn finish(self: Box<Self>, _sink: &mut ViolationSink) {}
}

/// Result of scanning one rule over one row stream.
#[derive(Debug)]
pub struct Evaluation {
    /// Collected violations
    pub sink: ViolationSink,
    /// Rows observed before the scan ended
    pub rows_scanned: usize,
    /// True if cancellation stopped the scan early
    pub interrupted: bool,
}

fn check_for<'a>(rule: &'a Rule, ctx: &EvalContext) -> Box<dyn RowCheck + 'a> {
    match &rule.kind {
        RuleKind::KeyIntegrity { key_columns } => {
            Box::new(integrity::KeyIntegrityCheck::new(rule, key_columns))
        }
        RuleKind::NoUnwantedWhitespace { columns } => {
            Box::new(format::WhitespaceCheck::new(rule, columns))
        }
        RuleKind::DomainMembership {
            column,
            mapping,
            default_label,
        } => Box::new(domain::DomainCheck::new(rule, column, mapping, default_label)),
        RuleKind::CrossFieldArithmetic {
            result_column,
            operands,
            op,
            tolerance,
            require_positive,
        } => Box::new(arithmetic::ArithmeticCheck {
            rule,
            result_column,
            operands,
            op: *op,
            tolerance: *tolerance,
            require_positive: *require_positive,
        }),
        RuleKind::DateOrder {
            earlier_column,
            later_columns,
        } => Box::new(temporal::DateOrderCheck::new(
            rule,
            earlier_column,
            later_columns,
        )),
        RuleKind::DateRange { column, min, max } => Box::new(temporal::DateRangeCheck::new(
            rule,
            column,
            *min,
            *max,
            ctx.run_time,
        )),
        RuleKind::LatestWinsDedup(spec) => Box::new(reconcile::SupersededCheck::new(rule, spec)),
    }
}

/// Evaluates a rule over a row stream.
///
/// Malformed rows never fail the evaluation; they become violations. Only a
/// failing stream does.
///
/// # Errors
///
/// Returns the first [`DataAccessError`] yielded by `rows`.
pub fn evaluate(
    rule: &Rule,
    rows: RowStream,
    ctx: &EvalContext,
) -> Result<Evaluation, DataAccessError> {
    let mut check = check_for(rule, ctx);
    let mut sink = ViolationSink::new(ctx.max_retained);
    let mut rows_scanned = 0;
    let mut interrupted = false;

    for item in rows {
        if ctx.cancel.is_cancelled() {
            interrupted = true;
            break;
        }
        let row = item?;
        check.observe(rows_scanned, &row, &mut sink);
        rows_scanned += 1;
    }

    check.finish(&mut sink);

    Ok(Evaluation {
        sink,
        rows_scanned,
        interrupted,
    })
}

/// Evaluates a rule over an in-memory dataset and returns every violation.
///
/// Convenient for embedding and tests; the executor uses [`evaluate`].
///
/// ```rust
/// use chrono::NaiveDate;
/// use quality_core::RuleBuilder;
/// use quality_validator::{check_dataset, row, DataSet, DataValue};
///
/// let rule = RuleBuilder::no_unwanted_whitespace("cntry_trimmed", ["cntry"])
///     .dataset("silver.erp_loc_a101")
///     .build();
/// let data = DataSet::from_rows(vec![
///     row([("cntry", "Germany".into())]),
///     row([("cntry", " Germany".into())]),
/// ]);
/// let run_time = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
///
/// let violations = check_dataset(&rule, &data, run_time);
/// assert_eq!(violations.len(), 1);
/// assert_eq!(violations[0].row, Some(1));
/// ```
pub fn check_dataset(rule: &Rule, data: &DataSet, run_time: NaiveDateTime) -> Vec<Violation> {
    let stream = Arc::new(data.clone()).stream();
    match evaluate(rule, stream, &EvalContext::new(run_time)) {
        Ok(evaluation) => evaluation.sink.into_violations(),
        Err(e) => vec![Violation::execution_error(rule, e.to_string())],
    }
}

/// Hashable grouping key for a set of columns: one type-tagged part per
/// column, so `Int(1)` and `"1"` never collide.
pub(crate) type GroupKey = Vec<String>;

/// Builds the grouping key of a row, or `None` if any key column is null.
pub(crate) fn group_key(row: &DataRow, columns: &[String]) -> Option<GroupKey> {
    columns
        .iter()
        .map(|c| match cell(row, c) {
            DataValue::Null => None,
            value => Some(format!("{}:{}", value.type_name(), value)),
        })
        .collect()
}

/// Attaches the rule's identifying columns of `row` to a violation.
pub(crate) fn with_row_key(rule: &Rule, row: &DataRow, mut violation: Violation) -> Violation {
    for column in rule.key_columns() {
        violation = violation.with_key(column.clone(), cell(row, column).clone());
    }
    violation
}
