// src/benchmark/mod.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Array, UInt32Array},
    compute::take,
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{
    config::PipelineConfig,
    fields::{
        AVG_COST_MID, AVG_EFFICIENCY, AVG_EMISSIONS, BRAND, COST_MID, EFFICIENCY, EMISSIONS_T,
        ETHICAL, GDP, GROUP_KEY, SENTIMENT, SUSTAINABILITY, TRANSPARENCY,
    },
    table::{
        self,
        columns::{build_batch, columns_of, float_array, with_float_column},
        group::{self, key_columns, row_keys, sort_by_column, KeyValue},
    },
};

/// Indicators averaged per (brand, country, year) next to the summed GDP contribution.
pub const ESG_INDICATORS: [&str; 4] = [SUSTAINABILITY, ETHICAL, TRANSPARENCY, SENTIMENT];

/// Columns averaged per brand in the ESG summary, in output order.
pub const SUMMARY_COLUMNS: [&str; 5] = [
    EMISSIONS_T,
    SUSTAINABILITY,
    ETHICAL,
    TRANSPARENCY,
    EFFICIENCY,
];

/// The four tables the analyzer persists.
#[derive(Debug, Clone)]
pub struct BenchmarkTables {
    pub rank_emissions: RecordBatch,
    pub rank_cost: RecordBatch,
    pub rank_efficiency: RecordBatch,
    pub esg_summary: RecordBatch,
}

/// Mean of `value` per brand, written as `output`, sorted by that mean.
pub fn rank_by_mean(
    batch: &RecordBatch,
    value: &str,
    output: &str,
    descending: bool,
) -> Result<RecordBatch> {
    let values = table::float_values(batch, value)?;
    let groups = table::group_rows(batch, &[BRAND])?;
    let means = groups.iter().map(|g| group::mean(&values, &g.rows)).collect();

    let mut columns = key_columns(batch, &[BRAND], &groups)?;
    columns.push((Field::new(output, DataType::Float64, true), float_array(means)));
    let ranked = build_batch(columns, groups.len())?;
    sort_by_column(&ranked, output, descending)
}

/// Per (brand, country, year): summed GDP contribution and mean ESG indicators.
pub fn gdp_esg_table(clean: &RecordBatch) -> Result<RecordBatch> {
    let gdp = table::float_values(clean, GDP)?;
    let indicators = ESG_INDICATORS
        .iter()
        .map(|name| table::float_values(clean, name))
        .collect::<Result<Vec<_>>>()?;
    let groups = table::group_rows(clean, &GROUP_KEY)?;

    let mut columns = key_columns(clean, &GROUP_KEY, &groups)?;
    let gdp_sums = groups.iter().map(|g| Some(group::sum(&gdp, &g.rows))).collect();
    columns.push((Field::new(GDP, DataType::Float64, true), float_array(gdp_sums)));
    for (name, values) in ESG_INDICATORS.iter().zip(&indicators) {
        let means = groups.iter().map(|g| group::mean(values, &g.rows)).collect();
        columns.push((Field::new(*name, DataType::Float64, true), float_array(means)));
    }
    build_batch(columns, groups.len())
}

/// Left join of `cost` with `gdp_esg` on (brand, country, year).
///
/// Every cost row is kept, in order; the non-key columns of `gdp_esg` are null
/// where no key matches.
pub fn merge_gdp_esg(cost: &RecordBatch, gdp_esg: &RecordBatch) -> Result<RecordBatch> {
    let mut lookup: BTreeMap<Vec<KeyValue>, u32> = BTreeMap::new();
    for (row, key) in row_keys(gdp_esg, &GROUP_KEY)?.into_iter().enumerate() {
        if let Some(key) = key {
            lookup.entry(key).or_insert(row as u32);
        }
    }

    let matches: UInt32Array = row_keys(cost, &GROUP_KEY)?
        .into_iter()
        .map(|key| key.and_then(|k| lookup.get(&k).copied()))
        .collect();
    debug!(
        rows = cost.num_rows(),
        unmatched = matches.null_count(),
        "joined GDP/ESG onto cost table"
    );

    let mut columns = columns_of(cost);
    for (field, array) in columns_of(gdp_esg) {
        if GROUP_KEY.contains(&field.name().as_str()) {
            continue;
        }
        let joined = take(array.as_ref(), &matches, None)
            .with_context(|| format!("joining column `{}`", field.name()))?;
        columns.push((field.with_nullable(true), joined));
    }
    build_batch(columns, cost.num_rows())
}

/// tCO2e per million USD of GDP contribution.
///
/// Null when either side is missing; a zero GDP contribution gives `inf` or `NaN`,
/// which is kept so the row still shows up downstream.
pub fn add_efficiency(merged: &RecordBatch) -> Result<RecordBatch> {
    let emissions = table::float_values(merged, EMISSIONS_T)?;
    let gdp = table::float_values(merged, GDP)?;
    let efficiency = emissions
        .iter()
        .zip(&gdp)
        .map(|(e, g)| match (e, g) {
            (Some(e), Some(g)) => Some(e / g),
            _ => None,
        })
        .collect();
    with_float_column(merged, EFFICIENCY, efficiency)
}

/// Brand-level means of emissions, ESG indicators and efficiency, lowest efficiency first.
pub fn brand_esg_summary(with_efficiency: &RecordBatch) -> Result<RecordBatch> {
    let groups = table::group_rows(with_efficiency, &[BRAND])?;
    let mut columns = key_columns(with_efficiency, &[BRAND], &groups)?;
    for name in SUMMARY_COLUMNS {
        let values = table::float_values(with_efficiency, name)?;
        let means = groups.iter().map(|g| group::mean(&values, &g.rows)).collect();
        columns.push((Field::new(name, DataType::Float64, true), float_array(means)));
    }
    let summary = build_batch(columns, groups.len())?;
    sort_by_column(&summary, EFFICIENCY, false)
}

/// Rank brands and build the ESG summary from the cost and clean tables.
pub fn analyze(cost: &RecordBatch, clean: &RecordBatch) -> Result<BenchmarkTables> {
    let rank_emissions = rank_by_mean(cost, EMISSIONS_T, AVG_EMISSIONS, true)?;
    let rank_cost = rank_by_mean(cost, COST_MID, AVG_COST_MID, true)?;

    let gdp_esg = gdp_esg_table(clean).context("building GDP/ESG table")?;
    let merged = add_efficiency(&merge_gdp_esg(cost, &gdp_esg)?)?;

    let rank_efficiency = rank_by_mean(&merged, EFFICIENCY, AVG_EFFICIENCY, false)?;
    let esg_summary = brand_esg_summary(&merged)?;

    Ok(BenchmarkTables {
        rank_emissions,
        rank_cost,
        rank_efficiency,
        esg_summary,
    })
}

const PREVIEW_ROWS: usize = 5;

fn print_table(title: &str, batch: &RecordBatch, rows: usize) -> Result<()> {
    println!("\n{}", title);
    println!("{}", table::preview(batch, rows)?);
    Ok(())
}

/// Read both tables, analyze, print, and persist the four outputs.
#[tracing::instrument(level = "info", skip(config))]
pub fn run(config: &PipelineConfig) -> Result<BenchmarkTables> {
    let cost = table::read_table(&config.cost_output)?;
    let clean = table::read_table(&config.clean_output)?;
    print_table("[INFO] Cost table head():", &cost, PREVIEW_ROWS)?;
    print_table("[INFO] Clean table head():", &clean, PREVIEW_ROWS)?;

    let tables = analyze(&cost, &clean)?;

    let outputs = [
        (
            "=== Ranking by emissions (avg) ===",
            &tables.rank_emissions,
            &config.rank_emissions_output,
        ),
        (
            "=== Ranking by carbon cost (€100/t, avg) ===",
            &tables.rank_cost,
            &config.rank_cost_output,
        ),
        (
            "=== Ranking by efficiency (lower = better) ===",
            &tables.rank_efficiency,
            &config.rank_efficiency_output,
        ),
        (
            "=== Brand ESG summary ===",
            &tables.esg_summary,
            &config.esg_summary_output,
        ),
    ];
    for (title, batch, _) in &outputs {
        print_table(title, batch, batch.num_rows())?;
    }
    for (_, batch, path) in &outputs {
        table::write_table(path, batch)?;
        info!(rows = batch.num_rows(), output = %path.display(), "benchmark table written");
    }
    Ok(tables)
}
