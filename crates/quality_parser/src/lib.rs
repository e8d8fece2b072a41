//! Parser for data quality rule catalogs (YAML/TOML formats).
//!
//! Catalog files are deserialized into [`Catalog`] and then resolved, so a
//! successfully parsed catalog is always ready to execute: every rule knows
//! its dataset and all identifiers and parameters have been checked.
//!
//! # Example
//!
//! ```rust
//! use quality_parser::parse_yaml;
//!
//! let yaml = r#"
//! name: silver_layer
//! groups:
//!   - name: customer_keys
//!     dataset: silver.crm_cust_info
//!     rules:
//!       - id: cst_id_unique
//!         kind: key_integrity
//!         key_columns: [cst_id]
//! "#;
//!
//! let catalog = parse_yaml(yaml).expect("Failed to parse catalog");
//! assert_eq!(catalog.name, "silver_layer");
//! assert_eq!(catalog.rule("cst_id_unique").unwrap().dataset, "silver.crm_cust_info");
//! ```

use quality_core::{Catalog, ConfigurationError};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading a catalog.
#[derive(Debug, Error)]
pub enum ParserError {
    /// YAML parsing or deserialization failed
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// TOML parsing or deserialization failed
    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,

    /// The catalog parsed but is not valid
    #[error("Invalid catalog: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported catalog file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
}

/// Parse and resolve a catalog from a YAML string.
pub fn parse_yaml(content: &str) -> Result<Catalog> {
    let catalog: Catalog = serde_yaml_ng::from_str(content)?;
    Ok(catalog.resolve()?)
}

/// Parse and resolve a catalog from a TOML string.
///
/// TOML has native date literals; date bounds must be written as quoted
/// strings (`max = "2050-01-01"`).
///
/// # Example
///
/// ```rust
/// use quality_parser::parse_toml;
///
/// let toml = r#"
/// name = "silver_layer"
///
/// [[groups]]
/// name = "sales_dates"
/// dataset = "silver.crm_sales_details"
///
/// [[groups.rules]]
/// id = "order_before_ship"
/// kind = "date_order"
/// earlier_column = "sls_order_dt"
/// later_columns = ["sls_ship_dt", "sls_due_dt"]
/// "#;
///
/// let catalog = parse_toml(toml).unwrap();
/// assert_eq!(catalog.rule_count(), 1);
/// ```
pub fn parse_toml(content: &str) -> Result<Catalog> {
    let catalog: Catalog = toml::from_str(content)?;
    Ok(catalog.resolve()?)
}

/// Detect the catalog format from a file path based on its extension.
///
/// # Supported Extensions
///
/// * `.yaml`, `.yml` → `CatalogFormat::Yaml`
/// * `.toml` → `CatalogFormat::Toml`
///
/// # Errors
///
/// Returns `ParserError::InvalidExtension` if the file has no extension.
/// Returns `ParserError::UnsupportedFormat` if the extension is not recognized.
pub fn detect_format(path: &Path) -> Result<CatalogFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(CatalogFormat::Yaml),
        "toml" => Ok(CatalogFormat::Toml),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse a catalog from a file with automatic format detection.
///
/// # Example
///
/// ```no_run
/// use quality_parser::parse_file;
/// use std::path::Path;
///
/// let catalog = parse_file(Path::new("demos/silver_catalog.yml")).unwrap();
/// println!("Loaded catalog: {}", catalog.name);
/// ```
pub fn parse_file(path: &Path) -> Result<Catalog> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), ?format, "Parsing catalog file");

    match format {
        CatalogFormat::Yaml => parse_yaml(&content),
        CatalogFormat::Toml => parse_toml(&content),
    }
}

/// Parse several catalog files and merge them in the given order.
///
/// # Errors
///
/// Fails on the first file that cannot be parsed, or if the merged catalog
/// has colliding identifiers.
pub fn parse_files<P: AsRef<Path>>(paths: &[P]) -> Result<Catalog> {
    let mut merged: Option<Catalog> = None;
    for path in paths {
        let catalog = parse_file(path.as_ref())?;
        merged = Some(match merged {
            Some(acc) => acc.merge(catalog)?,
            None => catalog,
        });
    }
    merged.ok_or_else(|| ParserError::UnsupportedFormat("no catalog files given".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quality_core::{ArithmeticOp, DateBound, RuleKind, Severity};
    use std::io::Write;

    const SILVER_YAML: &str = r#"
name: silver_layer
version: "2.1.0"
description: Checks for the cleansed CRM and ERP tables
transforms:
  - id: latest_customers
    dataset: silver.crm_cust_info
    key_columns: [cst_id]
    recency_column: cst_create_date
groups:
  - name: customers
    dataset: silver.crm_cust_info
    rules:
      - id: cst_id_unique
        description: Customer ids are unique after dedup
        kind: key_integrity
        key_columns: [cst_id]
        depends_on: latest_customers
      - id: cst_marital_status_known
        kind: domain_membership
        column: cst_marital_status
        mapping: { S: Single, M: Married }
        severity: warning
  - name: sales
    dataset: silver.crm_sales_details
    rules:
      - id: sales_match
        kind: cross_field_arithmetic
        result_column: sls_sales
        operands: [sls_quantity, sls_price]
        tolerance: 0.01
        identify_by: [sls_ord_num]
      - id: bdate_range
        kind: date_range
        column: sls_order_dt
        min: "1924-01-01"
        max: now
"#;

    #[test]
    fn test_parse_valid_yaml() {
        let catalog = parse_yaml(SILVER_YAML).expect("Failed to parse valid YAML");

        assert_eq!(catalog.name, "silver_layer");
        assert_eq!(catalog.version, "2.1.0");
        assert_eq!(catalog.rule_count(), 4);
        assert_eq!(catalog.transforms.len(), 1);

        let unique = catalog.rule("cst_id_unique").unwrap();
        assert_eq!(unique.dataset, "silver.crm_cust_info");
        assert_eq!(unique.depends_on.as_deref(), Some("latest_customers"));
        assert_eq!(unique.severity, Severity::Blocking);

        let marital = catalog.rule("cst_marital_status_known").unwrap();
        assert_eq!(marital.severity, Severity::Advisory);
        match &marital.kind {
            RuleKind::DomainMembership {
                mapping,
                default_label,
                ..
            } => {
                assert_eq!(mapping.get("m"), Some("Married"));
                assert_eq!(default_label, "n/a");
            }
            other => panic!("unexpected kind {other:?}"),
        }

        match &catalog.rule("sales_match").unwrap().kind {
            RuleKind::CrossFieldArithmetic {
                op,
                tolerance,
                require_positive,
                ..
            } => {
                assert_eq!(*op, ArithmeticOp::Multiply);
                assert_eq!(*tolerance, 0.01);
                assert!(*require_positive);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        match &catalog.rule("bdate_range").unwrap().kind {
            RuleKind::DateRange { max, .. } => assert_eq!(*max, Some(DateBound::RunTime)),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let invalid_yaml = r#"
name: broken
groups:
  - name: g
    dataset: ds
    rules:
      - id: r
        kind: not_a_rule_kind
"#;

        let result = parse_yaml(invalid_yaml);
        assert!(matches!(result.unwrap_err(), ParserError::YamlError(_)));
    }

    #[test]
    fn test_parse_yaml_invalid_catalog() {
        let yaml = r#"
name: broken
groups:
  - name: g
    dataset: ds
    rules:
      - id: pk
        kind: key_integrity
        key_columns: [id]
        depends_on: missing_transform
"#;

        let result = parse_yaml(yaml);
        assert!(matches!(
            result.unwrap_err(),
            ParserError::Configuration(ConfigurationError::UnknownTransform { .. })
        ));
    }

    #[test]
    fn test_parse_yaml_bad_date_bound() {
        let yaml = r#"
name: broken
groups:
  - name: g
    dataset: ds
    rules:
      - id: range
        kind: date_range
        column: d
        max: someday
"#;

        assert!(parse_yaml(yaml).is_err());
    }

    #[test]
    fn test_parse_valid_toml() {
        let toml = r#"
name = "silver_layer"

[[transforms]]
id = "latest_products"
dataset = "silver.crm_prd_info"
key_columns = ["prd_key"]
recency_column = "prd_start_dt"
tie_breakers = ["prd_id"]

[[groups]]
name = "products"
dataset = "silver.crm_prd_info"

[[groups.rules]]
id = "prd_nm_trimmed"
kind = "no_unwanted_whitespace"
columns = ["prd_nm"]
severity = "advisory"

[[groups.rules]]
id = "prd_start_range"
kind = "date_range"
column = "prd_start_dt"
min = "1900-01-01"
"#;

        let catalog = parse_toml(toml).expect("Failed to parse valid TOML");

        assert_eq!(catalog.version, "1.0.0");
        assert_eq!(catalog.rule_count(), 2);
        assert_eq!(
            catalog.transform("latest_products").unwrap().spec.tie_breakers,
            vec!["prd_id"]
        );
        assert_eq!(
            catalog.rule("prd_nm_trimmed").unwrap().severity,
            Severity::Advisory
        );
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid_toml = r#"
name = "test"
[[[invalid syntax
"#;

        let result = parse_toml(invalid_toml);
        assert!(matches!(result.unwrap_err(), ParserError::TomlError(_)));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format(Path::new("catalog.yaml")).unwrap(),
            CatalogFormat::Yaml
        );
        assert_eq!(
            detect_format(Path::new("catalog.YML")).unwrap(),
            CatalogFormat::Yaml
        );
        assert_eq!(
            detect_format(Path::new("catalog.toml")).unwrap(),
            CatalogFormat::Toml
        );
        assert!(matches!(
            detect_format(Path::new("catalog.json")).unwrap_err(),
            ParserError::UnsupportedFormat(_)
        ));
        assert!(matches!(
            detect_format(Path::new("catalog")).unwrap_err(),
            ParserError::InvalidExtension
        ));
    }

    #[test]
    fn test_parse_files_merges() {
        let dir = tempfile::tempdir().unwrap();

        let first = dir.path().join("customers.yml");
        std::fs::File::create(&first)
            .unwrap()
            .write_all(SILVER_YAML.as_bytes())
            .unwrap();

        let second = dir.path().join("erp.toml");
        std::fs::write(
            &second,
            r#"
name = "erp"

[[groups]]
name = "locations"
dataset = "silver.erp_loc_a101"

[[groups.rules]]
id = "cntry_trimmed"
kind = "no_unwanted_whitespace"
columns = ["cntry"]
"#,
        )
        .unwrap();

        let merged = parse_files(&[first.clone(), second]).unwrap();
        assert_eq!(merged.name, "silver_layer");
        assert_eq!(merged.rule_count(), 5);

        let duplicate = parse_files(&[first.clone(), first]);
        assert!(matches!(
            duplicate.unwrap_err(),
            ParserError::Configuration(ConfigurationError::DuplicateId(_))
        ));
    }
}
