//! Apache DataFusion dataset access for the data quality engine.
//!
//! Datasets are files under a source directory. The accessor reads each one
//! through a DataFusion session, converts the Arrow record batches into rows
//! and keeps them for the whole run, so every rule sees the same snapshot.
//!
//! # Example
//!
//! ```no_run
//! use quality_datafusion::{DataFusionAccessor, SourceConfig};
//! use quality_validator::DatasetAccessor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SourceConfig::builder()
//!     .location("file:///var/warehouse")
//!     .batch_size(4096)
//!     .build()?;
//!
//! let accessor = DataFusionAccessor::load(&config, &["silver.crm_cust_info"]).await?;
//! let schema = accessor.schema("silver.crm_cust_info")?;
//! println!("{} columns", schema.columns.len());
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod accessor;
mod config;
mod converter;

pub use accessor::DataFusionAccessor;
pub use config::{FileFormat, SourceConfig, SourceConfigBuilder};
pub use converter::{arrow_value_to_data_value, batch_to_rows, semantic_type};

/// Errors raised while locating, reading or converting source files.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source settings are invalid
    #[error("Invalid dataset source configuration: {0}")]
    ConfigurationError(String),

    /// No file backs the dataset
    #[error("No data file for dataset '{dataset}' under {root}")]
    DatasetNotFound {
        /// Dataset identifier
        dataset: String,
        /// Source directory searched
        root: String,
    },

    /// A column has a type the engine cannot represent
    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedType {
        /// Column name
        column: String,
        /// Arrow type
        data_type: String,
    },

    /// An Arrow value could not be converted
    #[error("Failed to convert Arrow value: {0}")]
    TypeConversionError(String),

    /// DataFusion failed to plan or execute the scan
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Arrow failed to decode a batch
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}
