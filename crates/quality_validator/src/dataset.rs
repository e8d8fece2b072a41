//! In-memory rows and datasets.

use crate::accessor::RowStream;
use quality_core::DataValue;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A single row of data, keyed by column name.
pub type DataRow = HashMap<String, DataValue>;

/// Looks up a column, treating absent columns as null.
pub fn cell<'a>(row: &'a DataRow, column: &str) -> &'a DataValue {
    static NULL: DataValue = DataValue::Null;
    row.get(column).unwrap_or(&NULL)
}

/// Builds a row from `(column, value)` pairs.
///
/// ```rust
/// use quality_validator::{row, DataValue};
///
/// let r = row([("cst_id", DataValue::Int(1)), ("cst_key", "AW00011000".into())]);
/// assert_eq!(r.len(), 2);
/// ```
pub fn row<K, I>(pairs: I) -> DataRow
where
    K: Into<String>,
    I: IntoIterator<Item = (K, DataValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// A materialized dataset: rows in scan order.
///
/// Used for the output of preprocessing transforms and by
/// [`MemoryAccessor`](crate::MemoryAccessor).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    rows: Vec<DataRow>,
}

impl DataSet {
    /// Creates a new empty dataset.
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// Creates a new dataset from rows.
    pub fn from_rows(rows: Vec<DataRow>) -> Self {
        Self { rows }
    }

    /// Returns the number of rows in the dataset.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns an iterator over the rows.
    pub fn rows(&self) -> impl Iterator<Item = &DataRow> {
        self.rows.iter()
    }

    /// Gets a specific row by index.
    pub fn get_row(&self, index: usize) -> Option<&DataRow> {
        self.rows.get(index)
    }

    /// Adds a row to the dataset.
    pub fn add_row(&mut self, row: DataRow) {
        self.rows.push(row);
    }

    /// Every column name appearing in any row, sorted.
    pub fn column_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.rows.iter().flat_map(|r| r.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Streams the rows of a shared dataset without copying the whole set.
    pub fn stream(self: Arc<Self>) -> RowStream {
        let len = self.rows.len();
        Box::new((0..len).map(move |i| Ok(self.rows[i].clone())))
    }
}

impl FromIterator<DataRow> for DataSet {
    fn from_iter<T: IntoIterator<Item = DataRow>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
