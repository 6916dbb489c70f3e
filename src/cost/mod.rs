// src/cost/mod.rs

use anyhow::{Context, Result};
use arrow::{
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use tracing::{debug, info};

use crate::{
    config::{PipelineConfig, PriceScenario},
    fields::{EMISSIONS_T, GROUP_KEY},
    table::{
        self,
        columns::{build_batch, columns_of, float_array},
        group::{self, key_columns},
    },
};

/// Total tCO2e per (brand, country, year), one row per key in ascending key order.
pub fn aggregate_emissions(clean: &RecordBatch) -> Result<RecordBatch> {
    let emissions = table::float_values(clean, EMISSIONS_T)?;
    let groups = table::group_rows(clean, &GROUP_KEY)?;

    let totals = groups
        .iter()
        .map(|g| Some(group::sum(&emissions, &g.rows)))
        .collect();

    let mut columns = key_columns(clean, &GROUP_KEY, &groups)?;
    columns.push((Field::new(EMISSIONS_T, DataType::Float64, true), float_array(totals)));
    debug!(rows_in = clean.num_rows(), groups = groups.len(), "aggregated emissions");
    build_batch(columns, groups.len())
}

/// Append one cost column per scenario: summed emissions × price.
pub fn compute_carbon_costs(
    emissions: &RecordBatch,
    scenarios: &[PriceScenario],
) -> Result<RecordBatch> {
    let tonnes = table::float_values(emissions, EMISSIONS_T)?;
    let mut columns = columns_of(emissions);
    for scenario in scenarios {
        let cost = tonnes
            .iter()
            .map(|t| t.map(|t| t * scenario.eur_per_tonne))
            .collect();
        columns.push((
            Field::new(&scenario.column, DataType::Float64, true),
            float_array(cost),
        ));
    }
    build_batch(columns, emissions.num_rows())
}

/// Read the clean table, aggregate, price, and persist the emissions-cost table.
#[tracing::instrument(level = "info", skip(config), fields(input = %config.clean_output.display()))]
pub fn run(config: &PipelineConfig) -> Result<RecordBatch> {
    let clean = table::read_table(&config.clean_output)?;
    let aggregated = aggregate_emissions(&clean).context("aggregating emissions")?;
    let costed = compute_carbon_costs(&aggregated, &config.price_scenarios)?;
    table::write_table(&config.cost_output, &costed)?;
    info!(
        groups = costed.num_rows(),
        scenarios = config.price_scenarios.len(),
        output = %config.cost_output.display(),
        "emissions cost table written"
    );
    Ok(costed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{csv_batch, init_test_logging};
    use tempfile::tempdir;

    #[test]
    fn same_key_rows_sum_into_one() -> Result<()> {
        let tmp = tempdir()?;
        let clean = csv_batch(
            tmp.path(),
            "clean.csv",
            "brand,country,year,carbon_emissions_tco2e\nA,X,2020,10\nB,X,2020,7\nA,X,2020,15\nA,X,2021,1\n",
        )?;
        let agg = aggregate_emissions(&clean)?;

        assert_eq!(agg.num_rows(), 3);
        assert_eq!(
            table::text_values(&agg, "brand")?,
            vec![Some("A".into()), Some("A".into()), Some("B".into())]
        );
        assert_eq!(
            table::float_values(&agg, EMISSIONS_T)?,
            vec![Some(25.0), Some(1.0), Some(7.0)]
        );
        Ok(())
    }

    #[test]
    fn missing_emissions_column_is_an_error() -> Result<()> {
        let tmp = tempdir()?;
        let clean = csv_batch(tmp.path(), "clean.csv", "brand,country,year\nA,X,2020\n")?;
        let err = aggregate_emissions(&clean).unwrap_err();
        assert!(err.to_string().contains(EMISSIONS_T));
        Ok(())
    }

    #[test]
    fn costs_are_emissions_times_price() -> Result<()> {
        let tmp = tempdir()?;
        let clean = csv_batch(
            tmp.path(),
            "clean.csv",
            "brand,country,year,carbon_emissions_tco2e\nA,X,2020,12.5\nB,Y,2021,0.3\n",
        )?;
        let agg = aggregate_emissions(&clean)?;
        let scenarios = PipelineConfig::default().price_scenarios;
        let costed = compute_carbon_costs(&agg, &scenarios)?;

        let tonnes = table::float_values(&costed, EMISSIONS_T)?;
        for s in &scenarios {
            let cost = table::float_values(&costed, &s.column)?;
            for (t, c) in tonnes.iter().zip(&cost) {
                assert_eq!(c.unwrap(), t.unwrap() * s.eur_per_tonne);
            }
        }
        let names: Vec<String> = costed
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec![
                "brand",
                "country",
                "year",
                "carbon_emissions_tco2e",
                "cost_low_eur",
                "cost_mid_eur",
                "cost_high_eur"
            ]
        );
        Ok(())
    }

    #[test]
    fn run_reads_clean_and_writes_costs() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let config = PipelineConfig {
            clean_output: tmp.path().join("clean.csv"),
            cost_output: tmp.path().join("out/costs.csv"),
            ..PipelineConfig::default()
        };
        std::fs::write(
            &config.clean_output,
            "brand,country,year,carbon_emissions_tco2e\nA,X,2020,10\nA,X,2020,20\n",
        )?;

        run(&config)?;
        let costs = table::read_table(&config.cost_output)?;
        assert_eq!(table::float_values(&costs, "cost_mid_eur")?, vec![Some(3000.0)]);
        assert_eq!(table::float_values(&costs, "cost_high_eur")?, vec![Some(4500.0)]);
        Ok(())
    }
}
