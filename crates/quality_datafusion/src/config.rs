//! Configuration for file-backed dataset sources.

use crate::SourceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk format of a dataset file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Comma (or custom) separated values
    Csv,
    /// Apache Parquet
    Parquet,
    /// Newline-delimited JSON
    Json,
}

impl FileFormat {
    /// File extensions probed for a dataset, in lookup order.
    pub const EXTENSIONS: [(&'static str, FileFormat); 4] = [
        ("csv", FileFormat::Csv),
        ("parquet", FileFormat::Parquet),
        ("json", FileFormat::Json),
        ("ndjson", FileFormat::Json),
    ];
}

/// Where datasets live and how to read them.
///
/// A dataset id `layer.table` resolves to `<root>/layer/table.<ext>` or, if
/// that does not exist, `<root>/layer.table.<ext>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Source directory
    pub root: PathBuf,

    /// Rows per Arrow record batch
    pub batch_size: usize,

    /// Whether CSV files start with a header line
    pub csv_has_header: bool,

    /// CSV field delimiter
    pub csv_delimiter: u8,
}

impl SourceConfig {
    /// Creates a new builder for `SourceConfig`.
    pub fn builder() -> SourceConfigBuilder {
        SourceConfigBuilder::default()
    }

    /// Shorthand for a source at `location` with default options.
    pub fn from_location(location: &str) -> Result<Self, SourceError> {
        Self::builder().location(location).build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::ConfigurationError(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        if self.batch_size == 0 {
            return Err(SourceError::ConfigurationError(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Finds the file backing a dataset.
    pub fn resolve(&self, dataset_id: &str) -> Result<(PathBuf, FileFormat), SourceError> {
        let mut stems = Vec::with_capacity(2);
        if let Some((layer, table)) = dataset_id.split_once('.') {
            stems.push(self.root.join(layer).join(table));
        }
        stems.push(self.root.join(dataset_id));

        stems
            .iter()
            .flat_map(|stem| {
                FileFormat::EXTENSIONS
                    .iter()
                    .map(move |(ext, format)| (with_extension(stem, ext), *format))
            })
            .find(|(path, _)| path.is_file())
            .ok_or_else(|| SourceError::DatasetNotFound {
                dataset: dataset_id.to_string(),
                root: self.root.display().to_string(),
            })
    }
}

/// Appends an extension without replacing anything after a dot in the stem.
fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

/// Builder for `SourceConfig`.
#[derive(Debug, Clone)]
pub struct SourceConfigBuilder {
    location: Option<String>,
    batch_size: usize,
    csv_has_header: bool,
    csv_delimiter: u8,
}

impl Default for SourceConfigBuilder {
    fn default() -> Self {
        Self {
            location: None,
            batch_size: 8192,
            csv_has_header: true,
            csv_delimiter: b',',
        }
    }
}

impl SourceConfigBuilder {
    /// Sets the source location: `file:///path` or a plain directory path.
    pub fn location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the record batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets whether CSV files have a header line.
    pub fn csv_has_header(mut self, has_header: bool) -> Self {
        self.csv_has_header = has_header;
        self
    }

    /// Sets the CSV delimiter.
    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    /// Builds the `SourceConfig`.
    ///
    /// Returns an error if the location is missing, uses an unsupported
    /// scheme, or does not name an existing directory.
    pub fn build(self) -> Result<SourceConfig, SourceError> {
        let location = self.location.ok_or_else(|| {
            SourceError::ConfigurationError("location is required".to_string())
        })?;

        let config = SourceConfig {
            root: parse_location(&location)?,
            batch_size: self.batch_size,
            csv_has_header: self.csv_has_header,
            csv_delimiter: self.csv_delimiter,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_location(location: &str) -> Result<PathBuf, SourceError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(SourceError::ConfigurationError(
            "location cannot be empty".to_string(),
        ));
    }

    if let Some(path) = location.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }

    match location.split_once("://") {
        Some((scheme, _)) => Err(SourceError::ConfigurationError(format!(
            "unsupported scheme '{scheme}', expected file:// or a directory path"
        ))),
        None => Ok(PathBuf::from(location)),
    }
}
