use anyhow::{bail, Result};
use arrow::array::Array;
use std::{env, path::Path};
use toscane::table;
use tracing_subscriber::{fmt, EnvFilter};

const PREVIEW_ROWS: usize = 10;

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();

    // Expect exactly one CLI argument: path to a CSV or Parquet table.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        bail!("Usage: {} <TABLE_FILE>", args[0]);
    }
    inspect_table(Path::new(&args[1]))
}

/// Print the inferred schema, row count and the first rows of a persisted table.
fn inspect_table(path: &Path) -> Result<()> {
    let batch = table::read_table(path)?;

    println!("=== Table: {} ===", path.display());
    println!("Total rows:    {}", batch.num_rows());
    println!("Total columns: {}", batch.num_columns());
    println!();

    println!("=== Columns ===");
    for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
        println!(
            "- {:<40} | Type: {:<10} | Nulls: {}",
            field.name(),
            field.data_type().to_string(),
            array.null_count()
        );
    }
    println!();

    println!("=== First {} rows ===", PREVIEW_ROWS.min(batch.num_rows()));
    println!("{}", table::preview(&batch, PREVIEW_ROWS)?);
    Ok(())
}
