//! Key integrity: key columns must be non-null and unique.

use crate::dataset::{DataRow, cell};
use crate::evaluate::{GroupKey, RowCheck, ViolationSink, group_key, with_row_key};
use quality_core::{DataValue, Rule, Violation};
use std::collections::HashMap;

struct Group {
    key: Vec<(String, DataValue)>,
    rows: Vec<usize>,
}

/// Groups rows by key in one scan.
///
/// Null-keyed rows are reported immediately, one violation each, and are
/// never grouped. Duplicate groups are reported when the scan ends, in the
/// order their key was first seen.
pub(crate) struct KeyIntegrityCheck<'a> {
    rule: &'a Rule,
    key_columns: &'a [String],
    index: HashMap<GroupKey, usize>,
    groups: Vec<Group>,
}

impl<'a> KeyIntegrityCheck<'a> {
    pub(crate) fn new(rule: &'a Rule, key_columns: &'a [String]) -> Self {
        Self {
            rule,
            key_columns,
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl RowCheck for KeyIntegrityCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, sink: &mut ViolationSink) {
        let Some(key) = group_key(row, self.key_columns) else {
            let nulls: Vec<&str> = self
                .key_columns
                .iter()
                .filter(|c| cell(row, c).is_null())
                .map(String::as_str)
                .collect();
            let mut violation =
                Violation::new(self.rule, format!("null key column(s): {}", nulls.join(", ")))
                    .at_row(index);
            for column in &nulls {
                violation = violation.with_value(*column, DataValue::Null);
            }
            sink.push(with_row_key(self.rule, row, violation));
            return;
        };

        match self.index.get(&key) {
            Some(&slot) => self.groups[slot].rows.push(index),
            None => {
                self.index.insert(key, self.groups.len());
                self.groups.push(Group {
                    key: self
                        .key_columns
                        .iter()
                        .map(|c| (c.clone(), cell(row, c).clone()))
                        .collect(),
                    rows: vec![index],
                });
            }
        }
    }

    fn finish(self: Box<Self>, sink: &mut ViolationSink) {
        for group in self.groups.into_iter().filter(|g| g.rows.len() > 1) {
            let rows: Vec<String> = group.rows.iter().map(usize::to_string).collect();
            let mut violation = Violation::new(
                self.rule,
                format!(
                    "duplicate key: {} rows share it (rows {})",
                    group.rows.len(),
                    rows.join(", ")
                ),
            );
            for (column, value) in group.key {
                violation = violation.with_key(column, value);
            }
            sink.push(violation);
        }
    }
}
