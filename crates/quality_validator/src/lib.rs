//! # Quality Validator
//!
//! Rule evaluation and execution for warehouse data quality checks. This crate
//! turns a resolved [`Catalog`](quality_core::Catalog) into a
//! [`ValidationReport`](quality_core::ValidationReport):
//!
//! - Field normalization (whitespace, canonical enum codes)
//! - Per-kind rule evaluation over lazily streamed rows
//! - Latest-wins reconciliation of duplicate records
//! - Concurrent, cancellable execution with bounded violation retention
//! - JSON and CSV export of reports
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use quality_core::{ArithmeticOp, RuleBuilder};
//! use quality_validator::{check_dataset, row, DataSet, DataValue};
//!
//! let rule = RuleBuilder::cross_field_arithmetic(
//!     "sales_consistent",
//!     "sls_sales",
//!     ["sls_quantity", "sls_price"],
//!     ArithmeticOp::Multiply,
//! )
//! .dataset("silver.crm_sales_details")
//! .build();
//!
//! let sales = DataSet::from_rows(vec![
//!     row([("sls_sales", DataValue::Int(50)), ("sls_quantity", DataValue::Int(2)), ("sls_price", DataValue::Int(25))]),
//!     row([("sls_sales", DataValue::Int(0)), ("sls_quantity", DataValue::Int(1)), ("sls_price", DataValue::Int(25))]),
//! ]);
//! let run_time = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//!
//! let violations = check_dataset(&rule, &sales, run_time);
//! assert_eq!(violations.len(), 1);
//! assert_eq!(violations[0].row, Some(1));
//! ```

mod accessor;
mod arithmetic;
mod dataset;
mod domain;
mod engine;
mod error;
mod evaluate;
mod export;
mod format;
mod integrity;
mod normalize;
mod reconcile;
mod temporal;

pub use accessor::*;
pub use arithmetic::{apply, exceeds_tolerance, numeric};
pub use dataset::*;
pub use engine::*;
pub use error::*;
pub use evaluate::{EvalContext, Evaluation, ViolationSink, check_dataset, evaluate};
pub use export::*;
pub use normalize::*;
pub use reconcile::{latest_wins, materialize};
pub use temporal::parse_temporal;

pub use quality_core::DataValue;
