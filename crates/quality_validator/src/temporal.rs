//! Temporal ordering and range checks.

use crate::dataset::{DataRow, cell};
use crate::evaluate::{RowCheck, ViolationSink, with_row_key};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use quality_core::{DataValue, DateBound, EvaluationError, Rule, Violation};

/// Parses an 8-digit `YYYYMMDD` integer, the bronze tier's date encoding.
fn from_yyyymmdd(value: i64) -> Option<NaiveDate> {
    if !(10_000_000..=99_999_999).contains(&value) {
        return None;
    }
    let (year, rest) = (value / 10_000, value % 10_000);
    NaiveDate::from_ymd_opt(year as i32, (rest / 100) as u32, (rest % 100) as u32)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Parses a date or timestamp string in multiple formats.
///
/// Supports:
/// - ISO dates (e.g., "2024-01-15")
/// - RFC 3339 (e.g., "2024-01-15T10:30:00Z"), converted to UTC
/// - Common datetime formats (e.g., "2024-01-15 10:30:00", "2024-01-15T10:30:00")
/// - Slash dates (e.g., "2024/01/15")
/// - Compact dates (e.g., "20240115")
fn parse_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok().and_then(from_yyyymmdd).map(midnight);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(midnight(date));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(s, "%Y/%m/%d").ok().map(midnight)
}

/// Reads a cell as a point in time.
///
/// Returns `Ok(None)` for nulls. Dates are taken at midnight.
///
/// # Errors
///
/// Returns [`EvaluationError::Unparseable`] for anything that is not a
/// recognizable date, such as `0` or `"2024-13-40"`.
///
/// ```rust
/// use quality_core::DataValue;
/// use quality_validator::parse_temporal;
///
/// let from_int = parse_temporal(&DataValue::Int(20240115), "sls_order_dt").unwrap();
/// let from_text = parse_temporal(&DataValue::from("2024-01-15"), "sls_order_dt").unwrap();
/// assert_eq!(from_int, from_text);
/// assert!(parse_temporal(&DataValue::Int(0), "sls_order_dt").is_err());
/// ```
pub fn parse_temporal(
    value: &DataValue,
    column: &str,
) -> Result<Option<NaiveDateTime>, EvaluationError> {
    let parsed = match value {
        DataValue::Null => return Ok(None),
        DataValue::Date(date) => Some(midnight(*date)),
        DataValue::Timestamp(ts) => Some(*ts),
        DataValue::Int(i) => from_yyyymmdd(*i).map(midnight),
        DataValue::String(s) => parse_text(s),
        DataValue::Float(_) | DataValue::Bool(_) => None,
    };

    parsed
        .map(Some)
        .ok_or_else(|| EvaluationError::unparseable(column, "date", value))
}

fn display(ts: &NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.date().format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// `earlier_column` must not be after any of `later_columns`.
pub(crate) struct DateOrderCheck<'a> {
    rule: &'a Rule,
    earlier: &'a str,
    later: &'a [String],
}

impl<'a> DateOrderCheck<'a> {
    pub(crate) fn new(rule: &'a Rule, earlier: &'a str, later: &'a [String]) -> Self {
        Self {
            rule,
            earlier,
            later,
        }
    }

    fn reasons(&self, row: &DataRow) -> Vec<String> {
        let mut unparseable = Vec::new();
        let mut out_of_order = Vec::new();

        let earlier = match parse_temporal(cell(row, self.earlier), self.earlier) {
            Ok(value) => value,
            Err(e) => {
                unparseable.push(e.to_string());
                None
            }
        };

        for column in self.later {
            match parse_temporal(cell(row, column), column) {
                Ok(Some(later)) => {
                    if let Some(earlier) = earlier.filter(|e| *e > later) {
                        out_of_order.push(format!(
                            "{} ({}) is after {} ({})",
                            self.earlier,
                            display(&earlier),
                            column,
                            display(&later)
                        ));
                    }
                }
                Ok(None) => {}
                Err(e) => unparseable.push(e.to_string()),
            }
        }

        unparseable.extend(out_of_order);
        unparseable
    }
}

impl RowCheck for DateOrderCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, sink: &mut ViolationSink) {
        let reasons = self.reasons(row);
        if reasons.is_empty() {
            return;
        }

        let mut violation = Violation::new(self.rule, reasons.join("; ")).at_row(index);
        for column in std::iter::once(self.earlier).chain(self.later.iter().map(String::as_str)) {
            violation = violation.with_value(column, cell(row, column).clone());
        }
        sink.push(with_row_key(self.rule, row, violation));
    }
}

/// Column must lie within `[min, max]`.
///
/// Fixed bounds compare calendar dates; the `now` bound compares the full
/// timestamp against the run's start.
pub(crate) struct DateRangeCheck<'a> {
    rule: &'a Rule,
    column: &'a str,
    min: Option<DateBound>,
    max: Option<DateBound>,
    run_time: NaiveDateTime,
}

impl<'a> DateRangeCheck<'a> {
    pub(crate) fn new(
        rule: &'a Rule,
        column: &'a str,
        min: Option<DateBound>,
        max: Option<DateBound>,
        run_time: NaiveDateTime,
    ) -> Self {
        Self {
            rule,
            column,
            min,
            max,
            run_time,
        }
    }

    fn reason(&self, value: NaiveDateTime) -> Option<String> {
        let before_min = match self.min {
            Some(DateBound::Fixed(min)) => value.date() < min,
            Some(DateBound::RunTime) => value < self.run_time,
            None => false,
        };
        let after_max = match self.max {
            Some(DateBound::Fixed(max)) => value.date() > max,
            Some(DateBound::RunTime) => value > self.run_time,
            None => false,
        };

        let bound = |b: DateBound| match b {
            DateBound::Fixed(date) => date.format("%Y-%m-%d").to_string(),
            DateBound::RunTime => format!("now ({})", display(&self.run_time)),
        };

        match (before_min, after_max, self.min, self.max) {
            (true, _, Some(min), _) => Some(format!(
                "{} ({}) is before {}",
                self.column,
                display(&value),
                bound(min)
            )),
            (_, true, _, Some(max)) => Some(format!(
                "{} ({}) is after {}",
                self.column,
                display(&value),
                bound(max)
            )),
            _ => None,
        }
    }
}

impl RowCheck for DateRangeCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, sink: &mut ViolationSink) {
        let raw = cell(row, self.column);
        let reason = match parse_temporal(raw, self.column) {
            Ok(Some(value)) => self.reason(value),
            Ok(None) => None,
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = reason {
            let violation = Violation::new(self.rule, reason)
                .at_row(index)
                .with_value(self.column, raw.clone());
            sink.push(with_row_key(self.rule, row, violation));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataSet, check_dataset, row};
    use pretty_assertions::assert_eq;
    use quality_core::RuleBuilder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run_time() -> NaiveDateTime {
        date(2024, 6, 1).and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_temporal_formats() {
        let expected = Some(midnight(date(2024, 1, 15)));
        for raw in ["2024-01-15", "2024/01/15", "20240115", " 2024-01-15 "] {
            assert_eq!(
                parse_temporal(&DataValue::from(raw), "d").unwrap(),
                expected,
                "{raw}"
            );
        }
        assert_eq!(
            parse_temporal(&DataValue::Int(20240115), "d").unwrap(),
            expected
        );
        assert_eq!(
            parse_temporal(&DataValue::Date(date(2024, 1, 15)), "d").unwrap(),
            expected
        );
        assert_eq!(
            parse_temporal(&DataValue::from("2024-01-15T10:30:00Z"), "d").unwrap(),
            Some(date(2024, 1, 15).and_hms_opt(10, 30, 0).unwrap())
        );
        assert_eq!(
            parse_temporal(&DataValue::from("2024-01-15 10:30:00"), "d").unwrap(),
            Some(date(2024, 1, 15).and_hms_opt(10, 30, 0).unwrap())
        );
        assert_eq!(parse_temporal(&DataValue::Null, "d").unwrap(), None);
    }

    #[test]
    fn test_parse_temporal_garbage() {
        for bad in [
            DataValue::Int(0),
            DataValue::Int(20241340),
            DataValue::Int(5489),
            DataValue::from("2024-13-40"),
            DataValue::from("yesterday"),
            DataValue::from(""),
            DataValue::Float(20240115.0),
        ] {
            let err = parse_temporal(&bad, "sls_order_dt").unwrap_err();
            assert!(err.to_string().starts_with("unparseable"), "{bad:?}");
        }
    }

    #[test]
    fn test_order_after_ship_is_one_violation() {
        let rule = RuleBuilder::date_order(
            "order_before_ship",
            "sls_order_dt",
            ["sls_ship_dt", "sls_due_dt"],
        )
        .build();
        let data = DataSet::from_rows(vec![
            row([
                ("sls_order_dt", DataValue::Date(date(2024, 5, 1))),
                ("sls_ship_dt", DataValue::Date(date(2024, 4, 1))),
                ("sls_due_dt", DataValue::Null),
            ]),
            row([
                ("sls_order_dt", DataValue::Date(date(2024, 3, 1))),
                ("sls_ship_dt", DataValue::Date(date(2024, 3, 8))),
                ("sls_due_dt", DataValue::Date(date(2024, 3, 1))),
            ]),
        ]);

        let violations = check_dataset(&rule, &data, run_time());

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].row, Some(0));
        assert_eq!(
            violations[0].reason,
            "sls_order_dt (2024-05-01) is after sls_ship_dt (2024-04-01)"
        );
    }

    #[test]
    fn test_order_with_bronze_integer_dates() {
        let rule =
            RuleBuilder::date_order("order_before_ship", "sls_order_dt", ["sls_ship_dt"]).build();
        let data = DataSet::from_rows(vec![
            row([
                ("sls_order_dt", DataValue::Int(0)),
                ("sls_ship_dt", DataValue::Int(20240401)),
            ]),
            row([
                ("sls_order_dt", DataValue::Int(20240301)),
                ("sls_ship_dt", DataValue::Int(20240401)),
            ]),
        ]);

        let violations = check_dataset(&rule, &data, run_time());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].reason.starts_with("unparseable date in column 'sls_order_dt'"));
    }

    #[test]
    fn test_date_range_fixed_and_now() {
        let rule = RuleBuilder::date_range(
            "bdate_plausible",
            "bdate",
            Some(DateBound::Fixed(date(1924, 1, 1))),
            Some(DateBound::RunTime),
        )
        .build();
        let data = DataSet::from_rows(vec![
            row([("bdate", DataValue::Date(date(1980, 4, 2)))]),
            row([("bdate", DataValue::Date(date(1916, 2, 10)))]),
            row([("bdate", DataValue::Date(date(2042, 2, 10)))]),
            row([("bdate", DataValue::Null)]),
            row([("bdate", DataValue::Date(date(2024, 6, 1)))]),
            row([("bdate", DataValue::from("1924-01-01"))]),
        ]);

        let violations = check_dataset(&rule, &data, run_time());

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].row, Some(1));
        assert_eq!(violations[0].reason, "bdate (1916-02-10) is before 1924-01-01");
        assert_eq!(violations[1].row, Some(2));
        assert_eq!(
            violations[1].reason,
            "bdate (2042-02-10) is after now (2024-06-01 12:00:00)"
        );
    }

    #[test]
    fn test_date_range_fixed_max_uses_calendar_date() {
        let rule = RuleBuilder::date_range(
            "order_dt_range",
            "ts",
            None,
            Some(DateBound::Fixed(date(2050, 1, 1))),
        )
        .build();
        let data = DataSet::from_rows(vec![
            row([(
                "ts",
                DataValue::Timestamp(date(2050, 1, 1).and_hms_opt(23, 59, 0).unwrap()),
            )]),
            row([("ts", DataValue::Int(20500102))]),
        ]);

        let violations = check_dataset(&rule, &data, run_time());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].row, Some(1));
    }
}
