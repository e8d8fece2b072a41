//! File-backed dataset accessor.

use crate::{
    SourceError,
    config::{FileFormat, SourceConfig},
    converter::{batch_to_rows, semantic_type},
};
use chrono::Utc;
use datafusion::prelude::{
    CsvReadOptions, NdJsonReadOptions, ParquetReadOptions, SessionConfig, SessionContext,
};
use futures::TryStreamExt;
use quality_core::{DataAccessError, DatasetSchema};
use quality_validator::{DataSet, DatasetAccessor, RowStream};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Loaded {
    schema: DatasetSchema,
    data: Arc<DataSet>,
}

/// A [`DatasetAccessor`] over CSV, Parquet and NDJSON files.
///
/// Every requested dataset is read once by [`load`](Self::load). Datasets
/// that fail to load are remembered as failures, so only the rules reading
/// them are affected.
#[derive(Debug)]
pub struct DataFusionAccessor {
    datasets: HashMap<String, Result<Loaded, DataAccessError>>,
    snapshot: String,
}

impl DataFusionAccessor {
    /// Reads the given datasets from the source directory.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configuration is invalid. Per-dataset
    /// failures surface later through [`DatasetAccessor`] calls.
    pub async fn load<S: AsRef<str>>(
        config: &SourceConfig,
        dataset_ids: &[S],
    ) -> Result<Self, SourceError> {
        config.validate()?;

        info!(
            "Loading {} dataset(s) from {}",
            dataset_ids.len(),
            config.root.display()
        );

        // One partition keeps rows in file order, which dedup tie-breaks rely on
        let ctx = SessionContext::new_with_config(
            SessionConfig::new()
                .with_batch_size(config.batch_size)
                .with_target_partitions(1),
        );
        let mut datasets = HashMap::new();

        for (position, id) in dataset_ids.iter().enumerate() {
            let id = id.as_ref();
            let loaded = load_dataset(&ctx, config, id, &table_name(position, id))
                .await
                .map_err(|e| DataAccessError::new(id, e.to_string()));

            match &loaded {
                Ok(l) => debug!("Loaded '{}': {} rows", id, l.data.len()),
                Err(e) => warn!("{}", e),
            }
            datasets.insert(id.to_string(), loaded);
        }

        Ok(Self {
            datasets,
            snapshot: format!("{}@{}", config.root.display(), Utc::now().to_rfc3339()),
        })
    }

    /// Identifiers of the datasets that loaded successfully.
    pub fn loaded_datasets(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .datasets
            .iter()
            .filter(|(_, l)| l.is_ok())
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    fn loaded(&self, dataset_id: &str) -> Result<&Loaded, DataAccessError> {
        match self.datasets.get(dataset_id) {
            Some(Ok(loaded)) => Ok(loaded),
            Some(Err(e)) => Err(e.clone()),
            None => Err(DataAccessError::new(dataset_id, "dataset was not loaded")),
        }
    }
}

impl DatasetAccessor for DataFusionAccessor {
    fn schema(&self, dataset_id: &str) -> Result<DatasetSchema, DataAccessError> {
        self.loaded(dataset_id).map(|l| l.schema.clone())
    }

    fn scan(&self, dataset_id: &str) -> Result<RowStream, DataAccessError> {
        self.loaded(dataset_id).map(|l| Arc::clone(&l.data).stream())
    }

    fn snapshot_id(&self) -> Option<String> {
        Some(self.snapshot.clone())
    }
}

/// Table names may not contain dots, which DataFusion reads as qualifiers.
/// The load position keeps ids that sanitize alike (`a.b_c`, `a_b.c`) apart.
fn table_name(position: usize, dataset_id: &str) -> String {
    format!("t{position}_{}", dataset_id.replace(['.', '-'], "_"))
}

async fn load_dataset(
    ctx: &SessionContext,
    config: &SourceConfig,
    dataset_id: &str,
    table: &str,
) -> Result<Loaded, SourceError> {
    let (path, format) = config.resolve(dataset_id)?;
    register(ctx, config, table, &path, format).await?;

    let df = ctx.table(table).await?;

    let mut schema = DatasetSchema::new(dataset_id);
    for field in df.schema().fields() {
        let semantic = semantic_type(field.data_type()).ok_or_else(|| {
            SourceError::UnsupportedType {
                column: field.name().clone(),
                data_type: field.data_type().to_string(),
            }
        })?;
        schema = schema.with_column(field.name().clone(), semantic);
    }

    let mut stream = df.execute_stream().await?;
    let mut data = DataSet::empty();
    while let Some(batch) = stream.try_next().await? {
        debug!("Processing batch with {} rows", batch.num_rows());
        for row in batch_to_rows(&batch)? {
            data.add_row(row);
        }
    }

    Ok(Loaded {
        schema,
        data: Arc::new(data),
    })
}

async fn register(
    ctx: &SessionContext,
    config: &SourceConfig,
    table: &str,
    path: &Path,
    format: FileFormat,
) -> Result<(), SourceError> {
    let path_str = path.to_str().ok_or_else(|| {
        SourceError::ConfigurationError(format!("Invalid path: {}", path.display()))
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    debug!("Registering {} as '{}' ({:?})", path_str, table, format);

    match format {
        FileFormat::Csv => {
            let options = CsvReadOptions::new()
                .has_header(config.csv_has_header)
                .delimiter(config.csv_delimiter)
                .file_extension(&extension);
            ctx.register_csv(table, path_str, options).await?
        }
        FileFormat::Parquet => {
            let options = ParquetReadOptions {
                file_extension: &extension,
                ..Default::default()
            };
            ctx.register_parquet(table, path_str, options).await?
        }
        FileFormat::Json => {
            let options = NdJsonReadOptions::default().file_extension(&extension);
            ctx.register_json(table, path_str, options).await?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name() {
        assert_eq!(table_name(0, "silver.crm_cust_info"), "t0_silver_crm_cust_info");
        assert_eq!(table_name(3, "bronze.erp-px"), "t3_bronze_erp_px");
        assert_ne!(table_name(0, "a.b_c"), table_name(1, "a_b.c"));
    }
}
