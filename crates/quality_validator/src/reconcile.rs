//! Latest-wins reconciliation.
//!
//! Source systems append a new row each time a record changes. The
//! authoritative row of a key is the one with the greatest recency value;
//! ties are broken by each tie-breaker column (greatest first) and finally by
//! scan order (first scanned wins). Rows with a null key column have no
//! authoritative row and are dropped.

use crate::accessor::RowStream;
use crate::dataset::{DataRow, DataSet, cell};
use crate::evaluate::{GroupKey, RowCheck, ViolationSink, group_key};
use crate::temporal::parse_temporal;
use chrono::NaiveDateTime;
use quality_core::{DataAccessError, DataValue, DedupSpec, Rule, Violation};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Sort key of one cell. Variants are ordered from least to most recent:
/// missing and unparseable values always rank last.
#[derive(Debug, Clone, PartialEq)]
enum Rank {
    Missing,
    Number(f64),
    Text(String),
    Time(NaiveDateTime),
}

impl Rank {
    /// Ranks a cell. Text that is neither a date nor a number ranks as
    /// `Missing` unless `keep_text` is set (tie-breakers may be text codes;
    /// recency values may not).
    fn of(value: &DataValue, keep_text: bool) -> Self {
        match value {
            DataValue::Null => Rank::Missing,
            DataValue::Int(i) => Rank::Number(*i as f64),
            DataValue::Float(f) if f.is_nan() => Rank::Missing,
            DataValue::Float(f) => Rank::Number(*f),
            DataValue::Bool(b) => Rank::Number(f64::from(u8::from(*b))),
            DataValue::Date(_) | DataValue::Timestamp(_) | DataValue::String(_) => {
                if let Ok(Some(ts)) = parse_temporal(value, "") {
                    return Rank::Time(ts);
                }
                let text = value.as_string().unwrap_or_default();
                match text.trim().parse::<f64>() {
                    Ok(f) if !f.is_nan() => Rank::Number(f),
                    _ if keep_text => Rank::Text(text.to_string()),
                    _ => Rank::Missing,
                }
            }
        }
    }

    fn tier(&self) -> u8 {
        match self {
            Rank::Missing => 0,
            Rank::Number(_) => 1,
            Rank::Text(_) => 2,
            Rank::Time(_) => 3,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Rank::Number(a), Rank::Number(b)) => a.total_cmp(b),
            (Rank::Text(a), Rank::Text(b)) => a.cmp(b),
            (Rank::Time(a), Rank::Time(b)) => a.cmp(b),
            _ => self.tier().cmp(&other.tier()),
        }
    }
}

/// Recency value followed by tie-breaker values.
#[derive(Debug, Clone)]
struct Ranking(Vec<Rank>);

impl Ranking {
    fn of(row: &DataRow, spec: &DedupSpec) -> Self {
        let recency = Rank::of(cell(row, &spec.recency_column), false);
        Ranking(
            std::iter::once(recency)
                .chain(spec.tie_breakers.iter().map(|c| Rank::of(cell(row, c), true)))
                .collect(),
        )
    }

    /// Position of the first sort key on which the rankings differ, with
    /// the ordering at that position.
    fn first_difference(&self, other: &Self) -> Option<(usize, Ordering)> {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.compare(b))
            .enumerate()
            .find(|(_, o)| o.is_ne())
    }

    /// True if `self` strictly outranks `other`; equal rankings keep the
    /// earlier row.
    fn beats(&self, other: &Self) -> bool {
        matches!(self.first_difference(other), Some((_, Ordering::Greater)))
    }
}

struct Winner {
    ranking: Ranking,
    row: DataRow,
}

/// Streaming latest-wins reduction: keeps one candidate row per key.
struct LatestWins<'a> {
    spec: &'a DedupSpec,
    index: HashMap<GroupKey, usize>,
    winners: Vec<Winner>,
}

impl<'a> LatestWins<'a> {
    fn new(spec: &'a DedupSpec) -> Self {
        Self {
            spec,
            index: HashMap::new(),
            winners: Vec::new(),
        }
    }

    fn offer(&mut self, row: DataRow) {
        let Some(key) = group_key(&row, &self.spec.key_columns) else {
            return;
        };
        let ranking = Ranking::of(&row, self.spec);

        match self.index.get(&key) {
            Some(&slot) => {
                let current = &mut self.winners[slot];
                if ranking.beats(&current.ranking) {
                    *current = Winner { ranking, row };
                }
            }
            None => {
                self.index.insert(key, self.winners.len());
                self.winners.push(Winner { ranking, row });
            }
        }
    }

    /// Winning rows, ordered by the first appearance of their key.
    fn into_rows(self) -> Vec<DataRow> {
        self.winners.into_iter().map(|w| w.row).collect()
    }
}

/// Keeps exactly one row per key: the most recent one.
///
/// ```rust
/// use quality_core::{DataValue, DedupSpec};
/// use quality_validator::{latest_wins, row};
///
/// let spec = DedupSpec {
///     key_columns: vec!["cst_id".into()],
///     recency_column: "cst_create_date".into(),
///     tie_breakers: vec![],
/// };
/// let rows = vec![
///     row([("cst_id", DataValue::Int(29466)), ("cst_create_date", "2026-01-25".into())]),
///     row([("cst_id", DataValue::Int(29466)), ("cst_create_date", "2026-01-27".into())]),
/// ];
///
/// let latest = latest_wins(rows, &spec);
/// assert_eq!(latest.len(), 1);
/// assert_eq!(latest[0]["cst_create_date"], DataValue::from("2026-01-27"));
/// ```
pub fn latest_wins(rows: impl IntoIterator<Item = DataRow>, spec: &DedupSpec) -> Vec<DataRow> {
    let mut reduction = LatestWins::new(spec);
    for row in rows {
        reduction.offer(row);
    }
    reduction.into_rows()
}

/// Materializes a latest-wins transform over a row stream.
///
/// # Errors
///
/// Fails if the stream fails, or if `cancel` fires before the stream ends
/// (a partial reduction would silently pick wrong winners).
pub fn materialize(
    dataset: &str,
    rows: RowStream,
    spec: &DedupSpec,
    cancel: &CancellationToken,
) -> Result<DataSet, DataAccessError> {
    let mut reduction = LatestWins::new(spec);
    for item in rows {
        if cancel.is_cancelled() {
            return Err(DataAccessError::new(dataset, "transform interrupted"));
        }
        reduction.offer(item?);
    }
    Ok(DataSet::from_rows(reduction.into_rows()))
}

struct Candidate {
    index: usize,
    ranking: Ranking,
    key: Vec<(String, DataValue)>,
    identity: Vec<(String, DataValue)>,
    /// Recency value followed by tie-breaker values, as read.
    sort_values: Vec<DataValue>,
}

impl Candidate {
    /// Explains why `winner` outranks this superseded row.
    fn superseded_reason(&self, winner: &Candidate, spec: &DedupSpec) -> String {
        let recency = &spec.recency_column;
        match winner.ranking.first_difference(&self.ranking) {
            Some((0, _)) => format!(
                "superseded by row {} ({} {} is more recent than {})",
                winner.index, recency, winner.sort_values[0], self.sort_values[0]
            ),
            Some((position, _)) => format!(
                "superseded by row {} ({} ties at {}; tie-breaker {} {} outranks {})",
                winner.index,
                recency,
                self.sort_values[0],
                spec.tie_breakers[position - 1],
                winner.sort_values[position],
                self.sort_values[position]
            ),
            None => format!(
                "superseded by row {} ({} ties at {}; row {} was scanned first)",
                winner.index, recency, self.sort_values[0], winner.index
            ),
        }
    }
}

/// Standalone rule: reports every row superseded by a more recent row with
/// the same key, naming the winner. Needs every row's ranking, so candidates
/// are buffered per key until the scan ends.
pub(crate) struct SupersededCheck<'a> {
    rule: &'a Rule,
    spec: &'a DedupSpec,
    index: HashMap<GroupKey, usize>,
    groups: Vec<Vec<Candidate>>,
}

impl<'a> SupersededCheck<'a> {
    pub(crate) fn new(rule: &'a Rule, spec: &'a DedupSpec) -> Self {
        Self {
            rule,
            spec,
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl RowCheck for SupersededCheck<'_> {
    fn observe(&mut self, index: usize, row: &DataRow, _sink: &mut ViolationSink) {
        let Some(key) = group_key(row, &self.spec.key_columns) else {
            return;
        };
        let pairs = |columns: &[String]| -> Vec<(String, DataValue)> {
            columns
                .iter()
                .map(|c| (c.clone(), cell(row, c).clone()))
                .collect()
        };
        let candidate = Candidate {
            index,
            ranking: Ranking::of(row, self.spec),
            key: pairs(&self.spec.key_columns),
            identity: pairs(&self.rule.identify_by),
            sort_values: std::iter::once(&self.spec.recency_column)
                .chain(self.spec.tie_breakers.iter())
                .map(|c| cell(row, c).clone())
                .collect(),
        };

        match self.index.get(&key) {
            Some(&slot) => self.groups[slot].push(candidate),
            None => {
                self.index.insert(key, self.groups.len());
                self.groups.push(vec![candidate]);
            }
        }
    }

    fn finish(self: Box<Self>, sink: &mut ViolationSink) {
        let recency = &self.spec.recency_column;

        for group in self.groups.into_iter().filter(|g| g.len() > 1) {
            let winner = group
                .iter()
                .reduce(|best, c| if c.ranking.beats(&best.ranking) { c } else { best });
            let Some(winner) = winner else {
                continue;
            };

            let mut superseded: Vec<&Candidate> =
                group.iter().filter(|c| c.index != winner.index).collect();
            superseded.sort_by_key(|c| c.index);

            for candidate in superseded {
                let mut violation =
                    Violation::new(self.rule, candidate.superseded_reason(winner, self.spec))
                        .at_row(candidate.index)
                        .with_value(recency.clone(), candidate.sort_values[0].clone());
                for (column, value) in &candidate.key {
                    violation = violation.with_key(column.clone(), value.clone());
                }
                for (column, value) in &candidate.identity {
                    if !candidate.key.iter().any(|(k, _)| k == column) {
                        violation = violation.with_value(column.clone(), value.clone());
                    }
                }
                sink.push(violation);
            }
        }
    }
}
