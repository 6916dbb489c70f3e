// src/pipeline.rs

use anyhow::{Context, Result};
use std::{path::PathBuf, time::Instant};
use tracing::info;

use crate::{benchmark, clean, config::PipelineConfig, cost, report};

/// What one full run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub clean_rows: usize,
    pub cost_rows: usize,
    pub benchmark: benchmark::BenchmarkTables,
    pub charts: Vec<PathBuf>,
}

/// Run every stage in order. Each stage reads what the previous one wrote, and
/// the first failure ends the run.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let start = Instant::now();

    println!("Starting data processing...");
    let cleaned = clean::run(config).context("cleaning stage")?;

    println!("Computing emissions and carbon costs...");
    let costed = cost::run(config).context("cost aggregation stage")?;

    println!("Benchmarking brands...");
    let benchmark = benchmark::run(config).context("benchmark stage")?;

    println!("Rendering figures...");
    let charts = report::run(config).context("report stage")?;

    println!("\n[SUCCESS] Outputs saved:");
    for path in [
        &config.clean_output,
        &config.cost_output,
        &config.rank_emissions_output,
        &config.rank_cost_output,
        &config.rank_efficiency_output,
        &config.esg_summary_output,
    ]
    .into_iter()
    .chain(&charts)
    {
        println!(" - {}", path.display());
    }
    println!("Pipeline completed successfully.");
    info!(elapsed = ?start.elapsed(), "pipeline finished");

    Ok(RunSummary {
        clean_rows: cleaned.num_rows(),
        cost_rows: costed.num_rows(),
        benchmark,
        charts,
    })
}
