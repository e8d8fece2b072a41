//! Formatting checks on text columns.

use crate::dataset::{DataRow, cell};
use crate::evaluate::{RowCheck, ViolationSink, with_row_key};
use crate::normalize::is_clean;
use quality_core::{DataValue, Rule, Violation};

/// One violation per row where any listed text column has leading or
/// trailing whitespace. Nulls and non-text values never violate.
pub(crate) struct WhitespaceCheck<'a> {
    rule: &'a Rule,
    columns: &'a [String],
}

impl<'a> WhitespaceCheck<'a> {
    pub(crate) fn new(rule: &'a Rule, columns: &'a [String]) -> Self {
        Self { rule, columns }
    }
}

impl RowCheck for WhitespaceCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, sink: &mut ViolationSink) {
        let dirty: Vec<(&String, &DataValue)> = self
            .columns
            .iter()
            .filter_map(|c| match cell(row, c) {
                value @ DataValue::String(s) if !is_clean(s) => Some((c, value)),
                _ => None,
            })
            .collect();

        if dirty.is_empty() {
            return;
        }

        let names: Vec<&str> = dirty.iter().map(|(c, _)| c.as_str()).collect();
        let mut violation = Violation::new(
            self.rule,
            format!("unwanted leading/trailing whitespace in {}", names.join(", ")),
        )
        .at_row(index);
        for (column, value) in dirty {
            violation = violation.with_value(column.clone(), value.clone());
        }
        sink.push(with_row_key(self.rule, row, violation));
    }
}
