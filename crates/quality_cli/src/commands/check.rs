use anyhow::{Context, Result};
use quality_core::Catalog;
use quality_parser::parse_file;
use serde_json::json;
use std::path::Path;
use tracing::info;

use crate::{EXIT_PASS, SummaryFormat, output};

pub fn execute(catalog_path: &Path, format: SummaryFormat) -> Result<u8> {
    info!("Checking catalog: {}", catalog_path.display());

    let catalog = parse_file(catalog_path)
        .with_context(|| format!("Failed to parse catalog file: {}", catalog_path.display()))?;

    match format {
        SummaryFormat::Json => {
            let summary = json_summary(&catalog);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        SummaryFormat::Text => print_summary(&catalog),
    }

    Ok(EXIT_PASS)
}

fn print_summary(catalog: &Catalog) {
    output::print_info(&format!(
        "Catalog loaded: {} v{}",
        catalog.name, catalog.version
    ));
    output::print_success("Catalog is valid");

    println!("\nCatalog Summary:");
    println!("  Name:        {}", catalog.name);
    println!("  Version:     {}", catalog.version);
    println!(
        "  Description: {}",
        catalog.description.as_deref().unwrap_or("N/A")
    );
    println!("  Datasets:    {}", catalog.dataset_ids().join(", "));
    println!("  Rules:       {}", catalog.rule_count());

    if !catalog.transforms.is_empty() {
        println!("\nTransforms:");
        for t in &catalog.transforms {
            println!(
                "  {} on {} (key: {}, latest by {})",
                t.id,
                t.dataset,
                t.spec.key_columns.join(", "),
                t.spec.recency_column
            );
        }
    }

    for group in &catalog.groups {
        println!("\nGroup {} ({}):", group.name, group.dataset);
        for rule in &group.rules {
            let reads = rule
                .depends_on
                .as_deref()
                .map(|t| format!(" via {t}"))
                .unwrap_or_default();
            println!(
                "  {:<32} {:<24} {}{}",
                rule.id,
                rule.check_kind().as_str(),
                rule.severity,
                reads
            );
        }
    }
}

fn json_summary(catalog: &Catalog) -> serde_json::Value {
    json!({
        "name": catalog.name,
        "version": catalog.version,
        "description": catalog.description,
        "datasets": catalog.dataset_ids(),
        "transforms": catalog.transforms.iter().map(|t| &t.id).collect::<Vec<_>>(),
        "rules": catalog.rules().map(|r| json!({
            "id": r.id,
            "dataset": r.dataset,
            "kind": r.check_kind(),
            "severity": r.severity,
            "depends_on": r.depends_on,
        })).collect::<Vec<_>>(),
    })
}
