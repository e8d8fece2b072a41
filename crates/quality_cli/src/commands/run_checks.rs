use anyhow::{Context, Result, bail};
use quality_core::ValidationReport;
use quality_datafusion::{DataFusionAccessor, SourceConfig};
use quality_parser::parse_files;
use quality_validator::{ExecutorConfig, ValidationExecutor};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{EXIT_ERROR, EXIT_PASS, EXIT_VIOLATIONS, ReportFormat, output};

pub struct RunArgs {
    pub catalogs: Vec<PathBuf>,
    pub dataset_source: String,
    pub dataset: Option<String>,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_violations: usize,
    pub sample: usize,
}

pub async fn execute(args: RunArgs) -> Result<u8> {
    let mut catalog = parse_files(&args.catalogs).with_context(|| {
        format!(
            "Failed to load catalog: {}",
            args.catalogs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    if let Some(dataset) = &args.dataset {
        catalog = catalog.for_dataset(dataset);
        if catalog.rule_count() == 0 {
            bail!("No rules target dataset '{}'", dataset);
        }
    }

    info!(
        "Catalog '{}' loaded: {} rules over {} datasets",
        catalog.name,
        catalog.rule_count(),
        catalog.dataset_ids().len()
    );

    let source = SourceConfig::from_location(&args.dataset_source)
        .with_context(|| format!("Invalid dataset source: {}", args.dataset_source))?;
    let dataset_ids = catalog.dataset_ids();
    let accessor = DataFusionAccessor::load(&source, &dataset_ids)
        .await
        .context("Failed to open dataset source")?;
    let loaded = accessor.loaded_datasets();
    if loaded.len() < dataset_ids.len() {
        warn!(
            "Loaded {} of {} datasets; rules on the others will error",
            loaded.len(),
            dataset_ids.len()
        );
    } else {
        info!("Loaded {} datasets", loaded.len());
    }

    let mut config = ExecutorConfig::default().with_max_violations(args.max_violations);
    if let Some(n) = args.concurrency {
        config = config.with_max_concurrency(n);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current rows");
            interrupt.cancel();
        }
    });

    let report = ValidationExecutor::new(config)
        .run_with_cancellation(&catalog, Arc::new(accessor), cancel)
        .await;
    ctrl_c.abort();

    write_report(&report, &args)?;

    Ok(exit_code(&report))
}

fn write_report(report: &ValidationReport, args: &RunArgs) -> Result<()> {
    match &args.output {
        Some(path) => {
            colored::control::set_override(false);
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            output::write_report(report, args.format, args.sample, &mut writer)?;
            writer.flush()?;
            output::print_success(&format!("Report written to {}", path.display()));
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            output::write_report(report, args.format, args.sample, &mut writer)?;
        }
    }
    Ok(())
}

fn exit_code(report: &ValidationReport) -> u8 {
    if report.has_execution_errors() || report.partial {
        EXIT_ERROR
    } else if !report.is_pass() {
        EXIT_VIOLATIONS
    } else {
        EXIT_PASS
    }
}
