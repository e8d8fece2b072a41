//! End-to-end runs of the validation executor over in-memory datasets.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use quality_core::{
    ArithmeticOp, Catalog, CatalogBuilder, CheckGroupBuilder, CheckKind, DataAccessError,
    DatasetSchema, Interruption, RuleBuilder, RuleStatus, Severity,
};
use quality_validator::{
    DataSet, DataValue, DatasetAccessor, ExecutorConfig, MemoryAccessor, RowStream,
    ValidationExecutor, row,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CUSTOMERS: &str = "silver.crm_cust_info";
const SALES: &str = "silver.crm_sales_details";

fn date(y: i32, m: u32, d: u32) -> DataValue {
    DataValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn customers() -> DataSet {
    DataSet::from_rows(vec![
        row([("cst_id", DataValue::Int(29449)), ("cst_firstname", "Jon".into()), ("cst_create_date", date(2021, 1, 1))]),
        row([("cst_id", DataValue::Int(29449)), ("cst_firstname", " Jon".into()), ("cst_create_date", date(2022, 1, 1))]),
        row([("cst_id", DataValue::Int(29449)), ("cst_firstname", "Jon".into()), ("cst_create_date", date(2020, 1, 1))]),
        row([("cst_id", DataValue::Int(29450)), ("cst_firstname", "Ana".into()), ("cst_create_date", date(2023, 3, 2))]),
        row([("cst_id", DataValue::Null), ("cst_firstname", "Ghost".into()), ("cst_create_date", date(2023, 3, 2))]),
    ])
}

fn sales() -> DataSet {
    DataSet::from_rows(vec![
        row([("sls_sales", DataValue::Int(100)), ("sls_quantity", DataValue::Int(10)), ("sls_price", DataValue::Int(10))]),
        row([("sls_sales", DataValue::Int(0)), ("sls_quantity", DataValue::Int(5)), ("sls_price", DataValue::Int(5))]),
    ])
}

fn silver_catalog() -> Catalog {
    CatalogBuilder::new("silver")
        .transform("crm_cust_latest", CUSTOMERS, ["cst_id"], "cst_create_date")
        .group(
            CheckGroupBuilder::new("customers", CUSTOMERS)
                .rule(RuleBuilder::key_integrity("cst_id_raw", ["cst_id"]).build())
                .rule(
                    RuleBuilder::key_integrity("cst_id_dedup", ["cst_id"])
                        .depends_on("crm_cust_latest")
                        .build(),
                )
                .rule(
                    RuleBuilder::no_unwanted_whitespace("cst_names_trimmed", ["cst_firstname"])
                        .identify_by(["cst_id"])
                        .advisory()
                        .build(),
                )
                .build(),
        )
        .group(
            CheckGroupBuilder::new("sales", SALES)
                .rule(
                    RuleBuilder::cross_field_arithmetic(
                        "sales_consistent",
                        "sls_sales",
                        ["sls_quantity", "sls_price"],
                        ArithmeticOp::Multiply,
                    )
                    .build(),
                )
                .build(),
        )
        .build()
        .unwrap()
}

fn executor() -> ValidationExecutor {
    ValidationExecutor::new(ExecutorConfig::default().with_max_concurrency(2))
}

#[tokio::test]
async fn test_full_run() {
    let accessor = MemoryAccessor::new()
        .with_dataset(CUSTOMERS, customers())
        .with_dataset(SALES, sales());

    let report = executor().run(&silver_catalog(), Arc::new(accessor)).await;

    assert!(!report.partial);
    assert!(!report.is_pass());
    assert_eq!(report.stats.rules_total, 4);
    assert_eq!(report.stats.rules_evaluated, 4);

    let raw = report.outcome("cst_id_raw").unwrap();
    assert_eq!(raw.status, RuleStatus::Failed);
    // one duplicate group and one null key
    assert_eq!(raw.violation_count, 2);

    let dedup = report.outcome("cst_id_dedup").unwrap();
    assert_eq!(dedup.status, RuleStatus::Passed);
    assert_eq!(dedup.rows_scanned, 2);

    let trimmed = report.outcome("cst_names_trimmed").unwrap();
    assert_eq!(trimmed.severity, Severity::Advisory);
    assert_eq!(trimmed.violations[0].key.get("cst_id"), Some(&DataValue::Int(29449)));

    let sales = report.outcome("sales_consistent").unwrap();
    assert_eq!(sales.violation_count, 1);
    assert_eq!(sales.violations[0].row, Some(1));
}

#[tokio::test]
async fn test_failing_dataset_leaves_other_rules_intact() {
    let accessor = MemoryAccessor::new()
        .with_failure(CUSTOMERS, "connection refused")
        .with_dataset(SALES, sales());

    let report = executor().run(&silver_catalog(), Arc::new(accessor)).await;

    for id in ["cst_id_raw", "cst_id_dedup", "cst_names_trimmed"] {
        let outcome = report.outcome(id).unwrap();
        assert_eq!(outcome.status, RuleStatus::Errored, "{id}");
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].kind, CheckKind::RuleExecutionError);
        assert_eq!(outcome.violations[0].severity, Severity::Blocking);
        assert!(outcome.violations[0].reason.contains("connection refused"));
    }

    let sales = report.outcome("sales_consistent").unwrap();
    assert_eq!(sales.status, RuleStatus::Failed);
    assert_eq!(sales.violation_count, 1);
    assert!(report.has_execution_errors());
    assert!(!report.partial);
}

#[tokio::test]
async fn test_mid_stream_failure_errors_the_rule() {
    let accessor = MemoryAccessor::new()
        .with_dataset(CUSTOMERS, customers())
        .with_failure_after(SALES, sales(), 1, "read timed out");

    let report = executor().run(&silver_catalog(), Arc::new(accessor)).await;

    let sales = report.outcome("sales_consistent").unwrap();
    assert_eq!(sales.status, RuleStatus::Errored);
    assert!(sales.violations[0].reason.contains("read timed out"));
    assert_eq!(report.outcome("cst_id_dedup").unwrap().status, RuleStatus::Passed);
}

#[tokio::test]
async fn test_missing_column_is_an_execution_error() {
    let catalog = CatalogBuilder::new("silver")
        .group(
            CheckGroupBuilder::new("sales", SALES)
                .rule(RuleBuilder::date_order("order_before_ship", "sls_order_dt", ["sls_ship_dt"]).build())
                .build(),
        )
        .build()
        .unwrap();
    let accessor = MemoryAccessor::new().with_dataset(SALES, sales());

    let report = executor().run(&catalog, Arc::new(accessor)).await;
    let outcome = report.outcome("order_before_ship").unwrap();

    assert_eq!(outcome.status, RuleStatus::Errored);
    assert_eq!(outcome.rows_scanned, 0);
    assert!(outcome.violations[0].reason.contains("sls_order_dt"));
    assert!(!report.is_pass());
}

#[tokio::test]
async fn test_empty_dataset_with_explicit_schema_passes() {
    let schema = DatasetSchema::new(SALES)
        .with_column("sls_sales", quality_core::SemanticType::Integer)
        .with_column("sls_quantity", quality_core::SemanticType::Integer)
        .with_column("sls_price", quality_core::SemanticType::Integer);
    let catalog = silver_catalog().for_dataset(SALES);
    let accessor = MemoryAccessor::new().with_schema(schema, DataSet::empty());

    let report = executor().run(&catalog, Arc::new(accessor)).await;

    assert!(report.is_pass());
    assert_eq!(report.outcome("sales_consistent").unwrap().rows_scanned, 0);
}

#[tokio::test]
async fn test_failed_transform_errors_dependent_rules_only() {
    let accessor = MemoryAccessor::new()
        .with_failure_after(CUSTOMERS, customers(), 2, "disk quota")
        .with_dataset(SALES, sales());

    let report = executor().run(&silver_catalog(), Arc::new(accessor)).await;

    let dedup = report.outcome("cst_id_dedup").unwrap();
    assert_eq!(dedup.status, RuleStatus::Errored);
    assert!(dedup.violations[0].reason.contains("disk quota"));
    assert_eq!(report.outcome("sales_consistent").unwrap().status, RuleStatus::Failed);
}

#[tokio::test]
async fn test_truncation_keeps_full_count() {
    let dirty = DataSet::from_rows(
        (0..25)
            .map(|i| row([("cst_id", DataValue::Int(i)), ("cst_firstname", format!(" name{i}").into())]))
            .collect(),
    );
    let catalog = CatalogBuilder::new("silver")
        .group(
            CheckGroupBuilder::new("customers", CUSTOMERS)
                .rule(RuleBuilder::no_unwanted_whitespace("names_trimmed", ["cst_firstname"]).build())
                .build(),
        )
        .build()
        .unwrap();
    let accessor = MemoryAccessor::new().with_dataset(CUSTOMERS, dirty);

    let report = ValidationExecutor::new(ExecutorConfig::default().with_max_violations(10))
        .run(&catalog, Arc::new(accessor))
        .await;
    let outcome = report.outcome("names_trimmed").unwrap();

    assert_eq!(outcome.violation_count, 25);
    assert_eq!(outcome.violations.len(), 10);
    assert!(outcome.truncated);
    assert_eq!(report.total_violations(), 25);
    assert_eq!(outcome.violations[9].row, Some(9));
}

#[tokio::test]
async fn test_is_pass_tracks_blocking_rules_only() {
    let catalog = CatalogBuilder::new("silver")
        .group(
            CheckGroupBuilder::new("customers", CUSTOMERS)
                .rule(
                    RuleBuilder::no_unwanted_whitespace("names_trimmed", ["cst_firstname"])
                        .advisory()
                        .build(),
                )
                .rule(
                    RuleBuilder::key_integrity("cst_id_dedup", ["cst_id"])
                        .depends_on("crm_cust_latest")
                        .build(),
                )
                .build(),
        )
        .transform("crm_cust_latest", CUSTOMERS, ["cst_id"], "cst_create_date")
        .build()
        .unwrap();
    let accessor = Arc::new(MemoryAccessor::new().with_dataset(CUSTOMERS, customers()));

    let report = executor().run(&catalog, accessor.clone()).await;
    assert_eq!(report.outcome("names_trimmed").unwrap().violation_count, 1);
    assert!(report.is_pass());

    let strict = CatalogBuilder::new("silver")
        .group(
            CheckGroupBuilder::new("customers", CUSTOMERS)
                .rule(RuleBuilder::no_unwanted_whitespace("names_trimmed", ["cst_firstname"]).build())
                .build(),
        )
        .build()
        .unwrap();
    let report = executor().run(&strict, accessor).await;
    assert!(!report.is_pass());
    assert_eq!(report.blocking_failures().count(), 1);
}

#[tokio::test]
async fn test_pinned_run_time_makes_now_bound_deterministic() {
    let catalog = CatalogBuilder::new("silver")
        .group(
            CheckGroupBuilder::new("customers", CUSTOMERS)
                .rule(
                    RuleBuilder::date_range(
                        "create_date_not_future",
                        "cst_create_date",
                        None,
                        Some(quality_core::DateBound::RunTime),
                    )
                    .build(),
                )
                .build(),
        )
        .build()
        .unwrap();
    let run_time = NaiveDate::from_ymd_opt(2022, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let accessor = Arc::new(MemoryAccessor::new().with_dataset(CUSTOMERS, customers()));

    let config = ExecutorConfig::default().with_run_time(run_time).with_snapshot("fixed");
    let first = ValidationExecutor::new(config.clone()).run(&catalog, accessor.clone()).await;
    let second = ValidationExecutor::new(config).run(&catalog, accessor).await;

    // both 2023-03-02 rows are in the future relative to 2022-06-01
    assert_eq!(first.total_violations(), 2);
    assert_eq!(first.outcomes[0].violations, second.outcomes[0].violations);
    assert_eq!(first.snapshot, "fixed");
}

/// Cancels the run once a scan has yielded `after` rows.
struct CancellingAccessor {
    inner: MemoryAccessor,
    cancel: CancellationToken,
    after: usize,
}

impl DatasetAccessor for CancellingAccessor {
    fn schema(&self, dataset_id: &str) -> Result<DatasetSchema, DataAccessError> {
        self.inner.schema(dataset_id)
    }

    fn scan(&self, dataset_id: &str) -> Result<RowStream, DataAccessError> {
        let cancel = self.cancel.clone();
        let after = self.after;
        let rows = self.inner.scan(dataset_id)?;
        Ok(Box::new(rows.enumerate().map(move |(i, item)| {
            if i == after {
                cancel.cancel();
            }
            item
        })))
    }
}

fn wide_customers(n: i64) -> DataSet {
    DataSet::from_rows(
        (0..n)
            .map(|i| row([("cst_id", DataValue::Int(i % 3)), ("cst_firstname", " x".into())]))
            .collect(),
    )
}

fn three_rule_catalog() -> Catalog {
    CatalogBuilder::new("silver")
        .group(
            CheckGroupBuilder::new("customers", CUSTOMERS)
                .rule(RuleBuilder::no_unwanted_whitespace("names_trimmed", ["cst_firstname"]).build())
                .rule(RuleBuilder::key_integrity("cst_id_unique", ["cst_id"]).build())
                .rule(RuleBuilder::no_unwanted_whitespace("names_trimmed_again", ["cst_firstname"]).build())
                .build(),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_cancellation_produces_partial_report() {
    let cancel = CancellationToken::new();
    let accessor = CancellingAccessor {
        inner: MemoryAccessor::new().with_dataset(CUSTOMERS, wide_customers(10)),
        cancel: cancel.clone(),
        after: 3,
    };

    let report = ValidationExecutor::new(ExecutorConfig::default().with_max_concurrency(1))
        .run_with_cancellation(&three_rule_catalog(), Arc::new(accessor), cancel)
        .await;

    assert!(report.partial);
    assert_eq!(report.interruption, Some(Interruption::Cancelled));

    let first = &report.outcomes[0];
    assert_eq!(first.status, RuleStatus::Interrupted);
    assert_eq!(first.rows_scanned, 3);
    assert_eq!(first.violation_count, 3);

    assert_eq!(report.outcomes[1].status, RuleStatus::Skipped);
    assert_eq!(report.outcomes[2].status, RuleStatus::Skipped);
    assert_eq!(report.stats.rules_evaluated, 0);
}

/// Sleeps before yielding each row.
struct SlowAccessor {
    inner: MemoryAccessor,
    delay: Duration,
}

impl DatasetAccessor for SlowAccessor {
    fn schema(&self, dataset_id: &str) -> Result<DatasetSchema, DataAccessError> {
        self.inner.schema(dataset_id)
    }

    fn scan(&self, dataset_id: &str) -> Result<RowStream, DataAccessError> {
        let delay = self.delay;
        let rows = self.inner.scan(dataset_id)?;
        Ok(Box::new(rows.inspect(move |_| std::thread::sleep(delay))))
    }
}

#[tokio::test]
async fn test_timeout_interrupts_run() {
    let accessor = SlowAccessor {
        inner: MemoryAccessor::new().with_dataset(CUSTOMERS, wide_customers(200)),
        delay: Duration::from_millis(10),
    };
    let config = ExecutorConfig::default()
        .with_max_concurrency(1)
        .with_timeout(Duration::from_millis(100));

    let report = ValidationExecutor::new(config)
        .run(&three_rule_catalog(), Arc::new(accessor))
        .await;

    assert!(report.partial);
    assert_eq!(report.interruption, Some(Interruption::TimedOut { after_ms: 100 }));
    assert_eq!(report.outcomes[0].status, RuleStatus::Interrupted);
    assert!(report.outcomes[0].rows_scanned < 200);
    assert_eq!(report.outcomes[2].status, RuleStatus::Skipped);
}
