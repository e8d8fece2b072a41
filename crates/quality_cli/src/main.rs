mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Every blocking rule passed.
pub const EXIT_PASS: u8 = 0;
/// At least one blocking rule produced a violation.
pub const EXIT_VIOLATIONS: u8 = 1;
/// The run could not complete: bad catalog, unreadable data, partial run or I/O failure.
pub const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "dq")]
#[command(version, about = "Warehouse data quality checks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

/// Output of `dq check`; a catalog summary has no tabular form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a rule catalog against a dataset source
    RunChecks {
        /// Catalog file(s) (YAML or TOML); several files are merged
        #[arg(short, long, required = true, num_args = 1..)]
        catalog: Vec<PathBuf>,

        /// Dataset source: file:///path or a directory
        #[arg(short = 's', long, env = "DQ_DATASET_SOURCE")]
        dataset_source: String,

        /// Only run the rules targeting this dataset
        #[arg(short, long)]
        dataset: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum rules evaluated at once (defaults to the number of CPUs)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Abort the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Violations retained per rule
        #[arg(long, default_value_t = quality_validator::DEFAULT_MAX_VIOLATIONS)]
        max_violations: usize,

        /// Violations shown per rule in the text report
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },

    /// Validate and summarize a catalog without reading any data
    Check {
        /// Path to the catalog file (YAML or TOML)
        catalog: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: SummaryFormat,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Commands::RunChecks {
            catalog,
            dataset_source,
            dataset,
            format,
            output,
            concurrency,
            timeout_secs,
            max_violations,
            sample,
        } => {
            let args = commands::run_checks::RunArgs {
                catalogs: catalog,
                dataset_source,
                dataset,
                format,
                output,
                concurrency,
                timeout_secs,
                max_violations,
                sample,
            };
            commands::run_checks::execute(args).await
        }

        Commands::Check { catalog, format } => commands::check::execute(&catalog, format),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output::print_error(&format!("Error: {e:#}"));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
