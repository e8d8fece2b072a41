//! Read-only access to datasets.
//!
//! The executor only ever talks to a [`DatasetAccessor`]; it never knows
//! whether rows come from memory, files or a warehouse.

use crate::dataset::{DataRow, DataSet};
use quality_core::{DataAccessError, DataValue, DatasetSchema, SemanticType};
use std::collections::HashMap;
use std::sync::Arc;

/// A lazy stream of rows in scan order.
///
/// An `Err` item aborts the scan; items after it are never requested.
pub type RowStream = Box<dyn Iterator<Item = Result<DataRow, DataAccessError>> + Send>;

/// Source of dataset schemas and row scans.
///
/// Implementations must be safe to share across the executor's worker threads
/// and must return the same rows for the same dataset for the duration of a
/// run.
pub trait DatasetAccessor: Send + Sync {
    /// Describes the columns of a dataset.
    fn schema(&self, dataset_id: &str) -> Result<DatasetSchema, DataAccessError>;

    /// Starts a full scan of a dataset.
    fn scan(&self, dataset_id: &str) -> Result<RowStream, DataAccessError>;

    /// Identifier of the data snapshot being read, if the source has one.
    fn snapshot_id(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Loaded {
        schema: DatasetSchema,
        data: Arc<DataSet>,
    },
    Failing(String),
    FailingAfter {
        schema: DatasetSchema,
        data: Arc<DataSet>,
        rows: usize,
        message: String,
    },
}

/// An accessor over datasets held in memory.
///
/// # Example
///
/// ```rust
/// use quality_validator::{row, DataSet, DataValue, DatasetAccessor, MemoryAccessor};
///
/// let accessor = MemoryAccessor::new().with_dataset(
///     "silver.erp_loc_a101",
///     DataSet::from_rows(vec![row([("cid", "AW00011000".into()), ("cntry", "Germany".into())])]),
/// );
///
/// assert!(accessor.schema("silver.erp_loc_a101").unwrap().has_column("cntry"));
/// assert_eq!(accessor.scan("silver.erp_loc_a101").unwrap().count(), 1);
/// assert!(accessor.scan("silver.unknown").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessor {
    datasets: HashMap<String, Entry>,
    snapshot: Option<String>,
}

impl MemoryAccessor {
    /// Creates an accessor with no datasets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dataset, inferring its schema from the rows.
    pub fn with_dataset(self, id: impl Into<String>, data: DataSet) -> Self {
        let id = id.into();
        let schema = infer_schema(&id, &data);
        self.with_schema(schema, data)
    }

    /// Registers a dataset with an explicit schema.
    pub fn with_schema(mut self, schema: DatasetSchema, data: DataSet) -> Self {
        self.datasets.insert(
            schema.id.clone(),
            Entry::Loaded {
                schema,
                data: Arc::new(data),
            },
        );
        self
    }

    /// Registers a dataset whose schema and scan calls always fail.
    pub fn with_failure(mut self, id: impl Into<String>, message: impl Into<String>) -> Self {
        self.datasets
            .insert(id.into(), Entry::Failing(message.into()));
        self
    }

    /// Registers a dataset whose scan fails after yielding `rows` rows.
    pub fn with_failure_after(
        mut self,
        id: impl Into<String>,
        data: DataSet,
        rows: usize,
        message: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let schema = infer_schema(&id, &data);
        self.datasets.insert(
            id,
            Entry::FailingAfter {
                schema,
                data: Arc::new(data),
                rows,
                message: message.into(),
            },
        );
        self
    }

    /// Sets the snapshot identifier reported to the executor.
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    fn entry(&self, dataset_id: &str) -> Result<&Entry, DataAccessError> {
        self.datasets
            .get(dataset_id)
            .ok_or_else(|| DataAccessError::new(dataset_id, "dataset is not registered"))
    }
}

impl DatasetAccessor for MemoryAccessor {
    fn schema(&self, dataset_id: &str) -> Result<DatasetSchema, DataAccessError> {
        match self.entry(dataset_id)? {
            Entry::Loaded { schema, .. } | Entry::FailingAfter { schema, .. } => {
                Ok(schema.clone())
            }
            Entry::Failing(message) => Err(DataAccessError::new(dataset_id, message.clone())),
        }
    }

    fn scan(&self, dataset_id: &str) -> Result<RowStream, DataAccessError> {
        match self.entry(dataset_id)? {
            Entry::Loaded { data, .. } => Ok(Arc::clone(data).stream()),
            Entry::Failing(message) => Err(DataAccessError::new(dataset_id, message.clone())),
            Entry::FailingAfter {
                data,
                rows,
                message,
                ..
            } => {
                let failure = DataAccessError::new(dataset_id, message.clone());
                Ok(Box::new(
                    Arc::clone(data)
                        .stream()
                        .take(*rows)
                        .chain(std::iter::once(Err(failure))),
                ))
            }
        }
    }

    fn snapshot_id(&self) -> Option<String> {
        self.snapshot.clone()
    }
}

fn semantic_type(value: &DataValue) -> Option<SemanticType> {
    match value {
        DataValue::Null => None,
        DataValue::String(_) => Some(SemanticType::Text),
        DataValue::Int(_) => Some(SemanticType::Integer),
        DataValue::Float(_) => Some(SemanticType::Decimal),
        DataValue::Bool(_) => Some(SemanticType::Boolean),
        DataValue::Date(_) => Some(SemanticType::Date),
        DataValue::Timestamp(_) => Some(SemanticType::Timestamp),
    }
}

/// Columns sorted by name, typed by their first non-null value.
fn infer_schema(id: &str, data: &DataSet) -> DatasetSchema {
    data.column_names()
        .into_iter()
        .fold(DatasetSchema::new(id), |schema, name| {
            let semantic = data
                .rows()
                .find_map(|r| r.get(&name).and_then(semantic_type))
                .unwrap_or(SemanticType::Text);
            schema.with_column(name, semantic)
        })
}
