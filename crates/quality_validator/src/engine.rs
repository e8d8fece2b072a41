//! Validation executor.
//!
//! The executor runs every rule of a catalog against a [`DatasetAccessor`]
//! and assembles a [`ValidationReport`]. Rules are evaluated on blocking
//! worker threads, at most `max_concurrency` at a time, and their outcomes
//! are reported in catalog order whatever order they complete in.

use crate::accessor::{DatasetAccessor, RowStream};
use crate::dataset::DataSet;
use crate::error::RuleError;
use crate::evaluate::{EvalContext, Evaluation, evaluate};
use crate::reconcile;
use chrono::{NaiveDateTime, Utc};
use quality_core::{
    Catalog, DataAccessError, Interruption, Rule, RuleOutcome, RuleStatus, Transform,
    ValidationReport, Violation,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of violations kept per rule.
pub const DEFAULT_MAX_VIOLATIONS: usize = 1000;

/// Executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of rules evaluated at the same time
    pub max_concurrency: usize,

    /// Time budget for the whole run
    pub timeout: Option<Duration>,

    /// Violations retained per rule; the rest are only counted
    pub max_violations_per_rule: usize,

    /// Snapshot identifier recorded in the report; defaults to the accessor's
    pub snapshot: Option<String>,

    /// Value of `now` in date bounds; defaults to the run start (UTC)
    pub run_time: Option<NaiveDateTime>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            timeout: None,
            max_violations_per_rule: DEFAULT_MAX_VIOLATIONS,
            snapshot: None,
            run_time: None,
        }
    }
}

impl ExecutorConfig {
    /// Sets the concurrency bound (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Sets the run time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how many violations each rule retains.
    pub fn with_max_violations(mut self, max_violations_per_rule: usize) -> Self {
        self.max_violations_per_rule = max_violations_per_rule;
        self
    }

    /// Sets the snapshot identifier.
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    /// Pins the value of `now`.
    pub fn with_run_time(mut self, run_time: NaiveDateTime) -> Self {
        self.run_time = Some(run_time);
        self
    }
}

type Materialized = Result<Arc<DataSet>, DataAccessError>;

/// Runs catalogs against datasets.
///
/// # Example
///
/// ```rust
/// use quality_core::{CatalogBuilder, CheckGroupBuilder, RuleBuilder};
/// use quality_validator::{row, DataSet, DataValue, ExecutorConfig, MemoryAccessor, ValidationExecutor};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let catalog = CatalogBuilder::new("silver")
///     .group(
///         CheckGroupBuilder::new("customer_keys", "silver.crm_cust_info")
///             .rule(RuleBuilder::key_integrity("cst_id_unique", ["cst_id"]).build())
///             .build(),
///     )
///     .build()
///     .unwrap();
///
/// let accessor = MemoryAccessor::new().with_dataset(
///     "silver.crm_cust_info",
///     DataSet::from_rows(vec![
///         row([("cst_id", DataValue::Int(1))]),
///         row([("cst_id", DataValue::Int(2))]),
///     ]),
/// );
///
/// let executor = ValidationExecutor::new(ExecutorConfig::default());
/// let report = executor.run(&catalog, Arc::new(accessor)).await;
/// assert!(report.is_pass());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationExecutor {
    config: ExecutorConfig,
}

impl ValidationExecutor {
    /// Creates an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Returns the executor settings.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs every rule of a resolved catalog.
    pub async fn run(
        &self,
        catalog: &Catalog,
        accessor: Arc<dyn DatasetAccessor>,
    ) -> ValidationReport {
        self.run_with_cancellation(catalog, accessor, CancellationToken::new())
            .await
    }

    /// Runs every rule of a resolved catalog until done or until `cancel`
    /// fires.
    ///
    /// After cancellation (or timeout) no new rule starts, rules in flight
    /// stop at the next row boundary and keep what they found, and the
    /// report is marked partial.
    pub async fn run_with_cancellation(
        &self,
        catalog: &Catalog,
        accessor: Arc<dyn DatasetAccessor>,
        cancel: CancellationToken,
    ) -> ValidationReport {
        let started_at = Utc::now();
        let token = cancel.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = self
            .config
            .timeout
            .map(|limit| spawn_timer(limit, token.clone(), Arc::clone(&timed_out)));

        let snapshot = self
            .config
            .snapshot
            .clone()
            .or_else(|| accessor.snapshot_id())
            .unwrap_or_else(|| started_at.to_rfc3339());

        info!(
            "Running catalog '{}' ({} rules) against snapshot '{}'",
            catalog.name,
            catalog.rule_count(),
            snapshot
        );

        let ctx = EvalContext {
            run_time: self.config.run_time.unwrap_or_else(|| started_at.naive_utc()),
            cancel: token.clone(),
            max_retained: self.config.max_violations_per_rule,
        };

        let transforms = materialize_transforms(catalog, &accessor, &token).await;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let mut launched: Vec<(Rule, Option<JoinHandle<RuleOutcome>>)> = Vec::new();
        for rule in catalog.rules() {
            let permit = if token.is_cancelled() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                }
            };

            let Some(permit) = permit.filter(|_| !token.is_cancelled()) else {
                debug!("Skipping rule '{}'", rule.id);
                launched.push((rule.clone(), None));
                continue;
            };

            let transformed = rule
                .depends_on
                .as_ref()
                .map(|id| transforms.get(id).cloned().unwrap_or_else(|| {
                    Err(DataAccessError::new(
                        &rule.dataset,
                        format!("transform '{id}' was not materialized"),
                    ))
                }));
            let task_rule = rule.clone();
            let task_accessor = Arc::clone(&accessor);
            let task_ctx = ctx.clone();

            debug!("Launching rule '{}' on '{}'", rule.id, rule.dataset);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run_rule(&task_rule, transformed, task_accessor.as_ref(), &task_ctx)
            });
            launched.push((rule.clone(), Some(handle)));
        }

        let mut outcomes = Vec::with_capacity(launched.len());
        for (rule, handle) in launched {
            let outcome = match handle {
                None => skipped(&rule),
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Rule '{}' aborted: {}", rule.id, e);
                        errored(&rule, &RuleError::Panicked(e.to_string()), 0)
                    }
                },
            };
            outcomes.push(outcome);
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        let stopped_early = outcomes
            .iter()
            .any(|o| matches!(o.status, RuleStatus::Interrupted | RuleStatus::Skipped));
        let interruption = if !stopped_early {
            None
        } else if timed_out.load(Ordering::SeqCst) {
            Some(Interruption::TimedOut {
                after_ms: self
                    .config
                    .timeout
                    .map(|t| t.as_millis() as u64)
                    .unwrap_or_default(),
            })
        } else {
            Some(Interruption::Cancelled)
        };

        let report = ValidationReport::new(
            &catalog.name,
            snapshot,
            started_at,
            Utc::now(),
            interruption,
            outcomes,
        );

        match report.interruption {
            Some(cause) => warn!(
                "Catalog '{}' stopped early ({}): {} of {} rules evaluated",
                catalog.name, cause, report.stats.rules_evaluated, report.stats.rules_total
            ),
            None => info!(
                "Catalog '{}' finished in {} ms: {} violations across {} rules",
                catalog.name,
                report.stats.duration_ms,
                report.total_violations(),
                report.stats.rules_failed
            ),
        }

        report
    }
}

fn spawn_timer(
    limit: Duration,
    token: CancellationToken,
    timed_out: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                warn!("Run exceeded its {} ms budget; cancelling", limit.as_millis());
                timed_out.store(true, Ordering::SeqCst);
                token.cancel();
            }
        }
    })
}

/// Materializes each transform a rule depends on, once.
async fn materialize_transforms(
    catalog: &Catalog,
    accessor: &Arc<dyn DatasetAccessor>,
    token: &CancellationToken,
) -> HashMap<String, Materialized> {
    let mut materialized = HashMap::new();

    for transform in catalog.referenced_transforms() {
        if token.is_cancelled() {
            break;
        }
        let owned = transform.clone();
        let task_accessor = Arc::clone(accessor);
        let task_token = token.clone();
        let result = tokio::task::spawn_blocking(move || {
            materialize(&owned, task_accessor.as_ref(), &task_token)
        })
        .await
        .unwrap_or_else(|e| {
            Err(DataAccessError::new(
                &transform.dataset,
                format!("transform '{}' panicked: {e}", transform.id),
            ))
        });

        match &result {
            Ok(data) => debug!(
                "Transform '{}' kept {} rows of '{}'",
                transform.id,
                data.len(),
                transform.dataset
            ),
            Err(e) => warn!("Transform '{}' failed: {}", transform.id, e),
        }
        materialized.insert(transform.id.clone(), result);
    }

    materialized
}

fn materialize(
    transform: &Transform,
    accessor: &dyn DatasetAccessor,
    token: &CancellationToken,
) -> Materialized {
    let schema = accessor.schema(&transform.dataset)?;
    let missing = schema.missing_columns(transform.spec.columns());
    if !missing.is_empty() {
        return Err(DataAccessError::new(
            &transform.dataset,
            format!(
                "transform '{}' reads missing column(s): {}",
                transform.id,
                missing.join(", ")
            ),
        ));
    }
    let rows = accessor.scan(&transform.dataset)?;
    reconcile::materialize(&transform.dataset, rows, &transform.spec, token).map(Arc::new)
}

fn open(
    rule: &Rule,
    transformed: Option<Materialized>,
    accessor: &dyn DatasetAccessor,
) -> Result<RowStream, RuleError> {
    let schema = accessor.schema(&rule.dataset)?;
    let missing = schema.missing_columns(rule.columns());
    if !missing.is_empty() {
        return Err(RuleError::missing_columns(&rule.dataset, &missing));
    }

    match transformed {
        Some(data) => Ok(data?.stream()),
        None => Ok(accessor.scan(&rule.dataset)?),
    }
}

fn run_rule(
    rule: &Rule,
    transformed: Option<Materialized>,
    accessor: &dyn DatasetAccessor,
    ctx: &EvalContext,
) -> RuleOutcome {
    let start = Instant::now();
    let result = open(rule, transformed, accessor)
        .and_then(|rows| evaluate(rule, rows, ctx).map_err(RuleError::from));
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(evaluation) => {
            debug!(
                "Rule '{}' scanned {} rows, {} violations",
                rule.id,
                evaluation.rows_scanned,
                evaluation.sink.count()
            );
            completed(rule, evaluation, duration_ms)
        }
        Err(e) => {
            warn!("Rule '{}' could not run: {}", rule.id, e);
            errored(rule, &e, duration_ms)
        }
    }
}

fn outcome(rule: &Rule, status: RuleStatus) -> RuleOutcome {
    RuleOutcome {
        rule_id: rule.id.clone(),
        description: rule.description.clone(),
        dataset: rule.dataset.clone(),
        kind: rule.check_kind(),
        severity: rule.severity,
        status,
        violation_count: 0,
        violations: Vec::new(),
        truncated: false,
        rows_scanned: 0,
        duration_ms: 0,
    }
}

fn completed(rule: &Rule, evaluation: Evaluation, duration_ms: u64) -> RuleOutcome {
    let Evaluation {
        sink,
        rows_scanned,
        interrupted,
    } = evaluation;

    let status = if interrupted {
        RuleStatus::Interrupted
    } else if sink.count() > 0 {
        RuleStatus::Failed
    } else {
        RuleStatus::Passed
    };

    RuleOutcome {
        violation_count: sink.count(),
        truncated: sink.truncated(),
        violations: sink.into_violations(),
        rows_scanned,
        duration_ms,
        ..outcome(rule, status)
    }
}

fn errored(rule: &Rule, error: &RuleError, duration_ms: u64) -> RuleOutcome {
    RuleOutcome {
        violation_count: 1,
        violations: vec![Violation::execution_error(rule, error.to_string())],
        duration_ms,
        ..outcome(rule, RuleStatus::Errored)
    }
}

fn skipped(rule: &Rule) -> RuleOutcome {
    outcome(rule, RuleStatus::Skipped)
}
