//! Bearish screener command implementation

use anyhow::{Context, Result};
use screener_policy::{PolicyDocument, SectorOutcome, TransformConfig, TransformReport, Variant};
use std::path::PathBuf;
use tracing::{debug, info};

pub fn run(
    policy_path: PathBuf,
    variant: Variant,
    config_path: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => {
            let config = TransformConfig::from_file(path)?;
            info!("Loaded transform config from: {}", path.display());
            config
        }
        None => TransformConfig::for_variant(variant),
    };
    debug!("Transform config: {:?}", config);

    let doc = PolicyDocument::load(&policy_path)
        .with_context(|| format!("Failed to load policy {}", policy_path.display()))?;
    info!("Loaded policy from: {}", policy_path.display());

    let (doc, report) = doc
        .transform(&config)
        .context("Failed to derive bearish screeners")?;

    if dry_run {
        info!("Dry run, {} not modified", policy_path.display());
    } else {
        doc.save(&policy_path)
            .with_context(|| format!("Failed to write policy {}", policy_path.display()))?;
    }

    print_summary(&report, &config, dry_run);
    Ok(())
}

fn print_summary(report: &TransformReport, config: &TransformConfig, dry_run: bool) {
    println!("\n{}", "=".repeat(60));
    if dry_run {
        println!("DRY RUN: bearish screeners computed, nothing written");
    } else {
        println!("SUCCESS: bearish screeners written to policy");
    }
    println!("{}", "=".repeat(60));

    for sector in &report.sectors {
        let name = sector.name.as_deref().unwrap_or("<unnamed>");
        match &sector.outcome {
            SectorOutcome::Untouched => {}
            SectorOutcome::Skipped { .. } => println!("  {:<26} skipped", name),
            SectorOutcome::Updated { added, .. } => {
                println!("  {:<26} {} added", name, added.len())
            }
        }
    }

    println!();
    println!("Screeners added:    {}", report.total_added());
    println!("Stale removed:      {}", report.total_removed());
    let skipped = report.skipped();
    if !skipped.is_empty() {
        println!("Sectors skipped:    {}", skipped.join(", "));
    }

    println!("\nBearish screeners by type:");
    for rule in &config.rules {
        println!("  - {} (from {})", rule.target, rule.source);
    }
    println!("{}", "=".repeat(60));
}
