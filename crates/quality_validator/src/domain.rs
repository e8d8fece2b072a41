//! Domain membership: discover coded values the mapping does not classify.

use crate::dataset::{DataRow, cell};
use crate::evaluate::{RowCheck, ViolationSink};
use crate::normalize::canonical_value;
use quality_core::{DataValue, EnumMapping, Rule, Violation};
use std::collections::HashMap;

struct Unmapped {
    canonical: String,
    first_row: usize,
    first_raw: DataValue,
    first_key: Vec<(String, DataValue)>,
    count: usize,
}

/// Informational check: one violation per distinct canonical value that the
/// mapping lacks, emitted when the scan ends in first-seen order.
pub(crate) struct DomainCheck<'a> {
    rule: &'a Rule,
    column: &'a str,
    mapping: &'a EnumMapping,
    default_label: &'a str,
    index: HashMap<String, usize>,
    unmapped: Vec<Unmapped>,
}

impl<'a> DomainCheck<'a> {
    pub(crate) fn new(
        rule: &'a Rule,
        column: &'a str,
        mapping: &'a EnumMapping,
        default_label: &'a str,
    ) -> Self {
        Self {
            rule,
            column,
            mapping,
            default_label,
            index: HashMap::new(),
            unmapped: Vec::new(),
        }
    }
}

impl RowCheck for DomainCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, _sink: &mut ViolationSink) {
        let raw = cell(row, self.column);
        let Some(canonical) = canonical_value(raw) else {
            return;
        };
        if self.mapping.contains(&canonical) {
            return;
        }

        match self.index.get(&canonical) {
            Some(&slot) => self.unmapped[slot].count += 1,
            None => {
                self.index.insert(canonical.clone(), self.unmapped.len());
                self.unmapped.push(Unmapped {
                    canonical,
                    first_row: index,
                    first_raw: raw.clone(),
                    first_key: self
                        .rule
                        .key_columns()
                        .iter()
                        .map(|c| (c.clone(), cell(row, c).clone()))
                        .collect(),
                    count: 1,
                });
            }
        }
    }

    fn finish(self: Box<Self>, sink: &mut ViolationSink) {
        for entry in self.unmapped {
            let mut violation = Violation::new(
                self.rule,
                format!(
                    "unmapped value '{}' in {} ({} row(s)); currently maps to '{}'",
                    entry.canonical, self.column, entry.count, self.default_label
                ),
            )
            .at_row(entry.first_row)
            .with_value(self.column, entry.first_raw);
            for (column, value) in entry.first_key {
                violation = violation.with_key(column, value);
            }
            sink.push(violation);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{DataSet, DataValue, check_dataset, row};
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;
    use quality_core::{EnumMapping, RuleBuilder};

    #[test]
    fn test_unmapped_values_grouped_by_canonical_form() {
        let rule = RuleBuilder::domain_membership(
            "cst_gndr_known",
            "cst_gndr",
            EnumMapping::new([("F", "Female"), ("M", "Male")]),
        )
        .identify_by(["cst_id"])
        .build();
        let data = DataSet::from_rows(vec![
            row([("cst_id", DataValue::Int(1)), ("cst_gndr", "f".into())]),
            row([("cst_id", DataValue::Int(2)), ("cst_gndr", " x".into())]),
            row([("cst_id", DataValue::Int(3)), ("cst_gndr", DataValue::Null)]),
            row([("cst_id", DataValue::Int(4)), ("cst_gndr", "X ".into())]),
            row([("cst_id", DataValue::Int(5)), ("cst_gndr", "U".into())]),
        ]);

        let violations = check_dataset(&rule, &data, NaiveDateTime::default());

        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0].reason,
            "unmapped value 'X' in cst_gndr (2 row(s)); currently maps to 'n/a'"
        );
        assert_eq!(violations[0].row, Some(1));
        assert_eq!(violations[0].values["cst_gndr"], DataValue::from(" x"));
        assert_eq!(violations[0].key["cst_id"], DataValue::Int(2));
        assert!(violations[1].reason.starts_with("unmapped value 'U'"));
    }

    #[test]
    fn test_custom_default_label() {
        let rule = RuleBuilder::domain_membership(
            "cntry_known",
            "cntry",
            EnumMapping::new([("DE", "Germany"), ("US", "United States")]),
        )
        .default_label("Unknown")
        .build();
        let data = DataSet::from_rows(vec![row([("cntry", "FR".into())])]);

        let violations = check_dataset(&rule, &data, NaiveDateTime::default());
        assert!(violations[0].reason.ends_with("currently maps to 'Unknown'"));
    }
}
