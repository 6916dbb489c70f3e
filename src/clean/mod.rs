// src/clean/mod.rs

pub mod stats;

use anyhow::{Context, Result};
use arrow::{
    array::{Array, BooleanArray},
    compute::filter_record_batch,
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use tracing::{debug, info};

use crate::{
    config::PipelineConfig,
    fields::{EMISSIONS_KG, EMISSIONS_T, GROUP_KEY},
    table::{
        self,
        columns::{
            array_to_f64, build_batch, columns_of, float_array, is_numeric, with_float_column,
        },
    },
};

/// Trim, lowercase, and turn spaces into underscores.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Rename every column with [`normalize_name`]; data is untouched.
pub fn normalize_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let columns = columns_of(batch)
        .into_iter()
        .map(|(f, a)| {
            let renamed = Field::new(normalize_name(f.name()), f.data_type().clone(), true);
            (renamed, a)
        })
        .collect();
    build_batch(columns, batch.num_rows())
}

/// Drop rows where `brand`, `country` or `year` is null.
///
/// Only true nulls count as missing; the reader has already turned empty fields
/// and markers such as `NA` into nulls. A whitespace-only value is kept as is.
pub fn drop_missing_identifiers(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut keep = vec![true; batch.num_rows()];
    for key in GROUP_KEY {
        let arr = table::column(batch, key)?;
        for (i, k) in keep.iter_mut().enumerate() {
            *k &= arr.is_valid(i);
        }
    }
    let mask = BooleanArray::from(keep);
    filter_record_batch(batch, &mask).context("dropping rows without identifiers")
}

/// Fill nulls (and NaN) in every numeric column with that column's median.
///
/// Columns without gaps keep their type. Integer columns with gaps become
/// Float64, as the median need not be whole. A column with no values at all is
/// left alone.
pub fn impute_medians(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut columns = columns_of(batch);
    for (field, array) in columns.iter_mut() {
        if !is_numeric(field.data_type()) {
            continue;
        }
        let values = array_to_f64(array)?;
        let is_gap = |v: &Option<f64>| v.map_or(true, f64::is_nan);
        if !values.iter().any(is_gap) {
            continue;
        }

        let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        let Some(median) = stats::median(&present) else {
            debug!(column = %field.name(), "no values to impute from");
            continue;
        };

        let filled = values
            .iter()
            .map(|v| if is_gap(v) { Some(median) } else { *v })
            .collect();
        debug!(column = %field.name(), median, "imputed gaps with median");
        *field = Field::new(field.name(), DataType::Float64, true);
        *array = float_array(filled);
    }
    build_batch(columns, batch.num_rows())
}

/// Derive `carbon_emissions_tco2e` from `carbon_emissions_kgco2e` when the latter exists.
pub fn convert_units(batch: &RecordBatch) -> Result<RecordBatch> {
    if !table::has_column(batch, EMISSIONS_KG) {
        debug!("no {} column; skipping unit conversion", EMISSIONS_KG);
        return Ok(batch.clone());
    }
    let tonnes = table::float_values(batch, EMISSIONS_KG)?
        .into_iter()
        .map(|kg| kg.map(|kg| kg / 1000.0))
        .collect();
    with_float_column(batch, EMISSIONS_T, tonnes)
}

/// Keep only rows whose `column` value lies within the IQR fences.
/// Rows with a missing value in `column` are dropped as well.
pub fn remove_outliers(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let values = table::float_values(batch, column)?;
    let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    let bounds = stats::iqr_bounds(&present);
    debug!(column, ?bounds, "outlier fences");

    let mask: BooleanArray = values
        .iter()
        .map(|v| match (v, bounds) {
            (Some(v), Some((lo, hi))) => Some(*v >= lo && *v <= hi),
            _ => Some(false),
        })
        .collect();
    filter_record_batch(batch, &mask).with_context(|| format!("filtering outliers on `{}`", column))
}

/// Every cleaning step, in order.
pub fn clean(raw: &RecordBatch) -> Result<RecordBatch> {
    let batch = normalize_columns(raw)?;
    let batch = drop_missing_identifiers(&batch)?;
    let batch = impute_medians(&batch)?;
    let batch = convert_units(&batch)?;
    if table::has_column(&batch, EMISSIONS_T) {
        remove_outliers(&batch, EMISSIONS_T)
    } else {
        Ok(batch)
    }
}

/// Read the raw input, clean it, and persist the clean table.
#[tracing::instrument(level = "info", skip(config), fields(input = %config.raw_input.display()))]
pub fn run(config: &PipelineConfig) -> Result<RecordBatch> {
    let raw = table::read_table(&config.raw_input)?;
    let cleaned = clean(&raw)?;
    table::write_table(&config.clean_output, &cleaned)?;
    info!(
        rows_in = raw.num_rows(),
        rows_out = cleaned.num_rows(),
        output = %config.clean_output.display(),
        "clean table written"
    );
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{csv_batch, init_test_logging};
    use arrow::{array::AsArray, datatypes::Int64Type};
    use tempfile::tempdir;

    const MESSY: &str = "\
 Brand ,Country,YEAR,Carbon Emissions KgCO2e,GDP Contribution Million USD,Ethical Rating
A,X,2020,1000,5,
A,X,2020,2000,,2
,Y,2021,3000,7,3
B,Y,2021,,9,4
B, ,2022,4000,1,5
C,Z,,5000,2,6
";

    #[test]
    fn names_are_trimmed_lowercased_underscored() {
        assert_eq!(normalize_name("  Carbon Emissions KgCO2e "), "carbon_emissions_kgco2e");
        assert_eq!(normalize_name("YEAR"), "year");
    }

    #[test]
    fn normalized_header_has_no_spaces_or_capitals() -> Result<()> {
        let tmp = tempdir()?;
        let batch = normalize_columns(&csv_batch(tmp.path(), "raw.csv", MESSY)?)?;
        for f in batch.schema().fields() {
            let name = f.name();
            assert_eq!(name.trim(), name);
            assert!(!name.contains(' '));
            assert_eq!(&name.to_lowercase(), name);
        }
        Ok(())
    }

    #[test]
    fn rows_without_identifiers_are_dropped() -> Result<()> {
        let tmp = tempdir()?;
        let batch = normalize_columns(&csv_batch(tmp.path(), "raw.csv", MESSY)?)?;
        let kept = drop_missing_identifiers(&batch)?;
        let brands = table::text_values(&kept, "brand")?;
        assert_eq!(
            brands,
            vec![
                Some("A".into()),
                Some("A".into()),
                Some("B".into()),
                Some("B".into())
            ]
        );
        let countries = table::text_values(&kept, "country")?;
        assert_eq!(countries[3].as_deref(), Some(" "));
        Ok(())
    }

    #[test]
    fn missing_identifier_column_is_an_error() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(tmp.path(), "raw.csv", "brand,year\nA,2020\n")?;
        let err = drop_missing_identifiers(&batch).unwrap_err();
        assert!(err.to_string().contains("`country`"));
        Ok(())
    }

    #[test]
    fn median_is_taken_after_dropping_rows() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(
            tmp.path(),
            "raw.csv",
            "brand,country,year,score\nA,X,2020,1\nA,X,2020,\n,X,2020,100\nB,Y,2021,3\n",
        )?;
        let filled = impute_medians(&drop_missing_identifiers(&batch)?)?;
        assert_eq!(
            table::float_values(&filled, "score")?,
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
        assert_eq!(filled.schema().field_with_name("score")?.data_type(), &DataType::Float64);
        Ok(())
    }

    #[test]
    fn complete_integer_columns_keep_their_type() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(tmp.path(), "raw.csv", "brand,country,year\nA,X,2020\nB,Y,2021\n")?;
        let filled = impute_medians(&batch)?;
        assert_eq!(filled.column(2).as_primitive::<Int64Type>().value(1), 2021);
        Ok(())
    }

    #[test]
    fn na_marker_is_filled_with_median() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(
            tmp.path(),
            "raw.csv",
            "brand,country,year,carbon_emissions_kgco2e\nA,X,2020,1000\nA,X,2021,NA\nB,Y,2020,3000\n",
        )?;
        let cleaned = clean(&batch)?;
        assert_eq!(
            table::float_values(&cleaned, EMISSIONS_T)?,
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
        Ok(())
    }

    #[test]
    fn kilograms_become_tonnes() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(
            tmp.path(),
            "raw.csv",
            "brand,country,year,carbon_emissions_kgco2e\nA,X,2020,2000\n",
        )?;
        let converted = convert_units(&batch)?;
        assert_eq!(table::float_values(&converted, EMISSIONS_T)?, vec![Some(2.0)]);
        Ok(())
    }

    #[test]
    fn outlier_row_is_removed() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(
            tmp.path(),
            "raw.csv",
            "brand,country,year,carbon_emissions_tco2e\nA,X,1,1\nA,X,2,2\nA,X,3,3\nA,X,4,4\nA,X,5,100\n",
        )?;
        let kept = remove_outliers(&batch, EMISSIONS_T)?;
        assert_eq!(
            table::float_values(&kept, EMISSIONS_T)?,
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]
        );
        Ok(())
    }

    #[test]
    fn without_emissions_columns_nothing_is_filtered() -> Result<()> {
        let tmp = tempdir()?;
        let batch = csv_batch(tmp.path(), "raw.csv", "Brand,Country,Year\nA,X,2020\nB,Y,2021\n")?;
        let cleaned = clean(&batch)?;
        assert_eq!(cleaned.num_rows(), 2);
        assert!(!table::has_column(&cleaned, EMISSIONS_T));
        Ok(())
    }

    #[test]
    fn run_writes_fully_populated_clean_table() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let raw = tmp.path().join("raw.csv");
        std::fs::write(&raw, MESSY)?;
        let config = PipelineConfig {
            raw_input: raw,
            clean_output: tmp.path().join("processed/clean.csv"),
            ..PipelineConfig::default()
        };

        run(&config)?;
        let clean = table::read_table(&config.clean_output)?;

        // 4000 kg is filtered as an outlier once the gap is filled with 2000.
        assert_eq!(clean.num_rows(), 3);
        let tonnes = table::float_values(&clean, EMISSIONS_T)?;
        assert_eq!(tonnes, vec![Some(1.0), Some(2.0), Some(2.0)]);
        for name in ["gdp_contribution_million_usd", "ethical_rating"] {
            assert!(table::float_values(&clean, name)?.iter().all(Option::is_some));
        }
        Ok(())
    }
}
