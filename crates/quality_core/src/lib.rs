//! # Data Quality Core
//!
//! Core data structures and types for the warehouse data quality engine.
//!
//! The engine checks tabular datasets produced by each pipeline stage
//! (raw "bronze" → cleansed "silver") against declarative rules and reports
//! every violating record.
//!
//! ## Key Concepts
//!
//! - **Rule**: one invariant over columns of one dataset, as a tagged [`RuleKind`]
//! - **Catalog**: ordered check groups plus named preprocessing transforms
//! - **Violation**: one instance of a rule failing for a row or group of rows
//! - **ValidationReport**: the outcome of one run, pass iff no blocking violation
//!
//! ## Example
//!
//! ```rust
//! use quality_core::{ArithmeticOp, CatalogBuilder, CheckGroupBuilder, RuleBuilder};
//!
//! let catalog = CatalogBuilder::new("silver_layer")
//!     .group(
//!         CheckGroupBuilder::new("sales", "silver.crm_sales_details")
//!             .rule(
//!                 RuleBuilder::cross_field_arithmetic(
//!                     "sales_match",
//!                     "sls_sales",
//!                     ["sls_quantity", "sls_price"],
//!                     ArithmeticOp::Multiply,
//!                 )
//!                 .build(),
//!             )
//!             .build(),
//!     )
//!     .build()
//!     .expect("valid catalog");
//!
//! assert_eq!(catalog.dataset_ids(), vec!["silver.crm_sales_details"]);
//! ```

pub mod builder;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod report;
pub mod rule;
pub mod value;
pub mod violation;

pub use builder::*;
pub use catalog::*;
pub use dataset::*;
pub use error::*;
pub use report::*;
pub use rule::*;
pub use value::*;
pub use violation::*;
