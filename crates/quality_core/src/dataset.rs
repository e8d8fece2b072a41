//! Dataset schema description.

use serde::{Deserialize, Serialize};

/// Semantic type of a column, independent of the storage engine's physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// Whole numbers
    Integer,
    /// Fixed or floating point numbers
    Decimal,
    /// Free text
    Text,
    /// Calendar dates
    Date,
    /// Date and time
    Timestamp,
    /// Booleans
    Boolean,
    /// Coded categorical values
    Enum,
}

/// A named column in a dataset schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Semantic type
    pub semantic_type: SemanticType,
}

impl Column {
    /// Creates a new column.
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
        }
    }
}

/// Ordered column schema of a dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Dataset identifier (e.g. "silver.crm_cust_info")
    pub id: String,
    /// Columns in declaration order
    pub columns: Vec<Column>,
}

impl DatasetSchema {
    /// Creates an empty schema for a dataset.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn with_column(mut self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.columns.push(Column::new(name, semantic_type));
        self
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the schema declares the column.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the subset of `columns` missing from this schema.
    pub fn missing_columns<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        columns
            .into_iter()
            .filter(|name| !self.has_column(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns() {
        let schema = DatasetSchema::new("silver.crm_sales_details")
            .with_column("sls_ord_num", SemanticType::Text)
            .with_column("sls_sales", SemanticType::Decimal);

        assert!(schema.has_column("sls_sales"));
        assert_eq!(
            schema.missing_columns(["sls_sales", "sls_price"]),
            vec!["sls_price"]
        );
    }
}
