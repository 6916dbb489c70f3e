use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder, WriterBuilder},
    datatypes::SchemaRef,
    record_batch::RecordBatch,
    util::pretty::pretty_format_batches,
};
use regex::Regex;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Seek, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

const READ_BATCH_SIZE: usize = 8192;

/// Text fields read as null: empty, plus the usual spreadsheet and pandas
/// missing-value markers. `NaN` is not listed; it parses as a float.
const NULL_MARKERS: &str =
    r"^(?:|NA|N/A|n/a|#N/A|#N/A N/A|#NA|<NA>|NULL|null|None|-1\.#IND|-1\.#QNAN|1\.#IND|1\.#QNAN)$";

fn null_markers() -> Result<Regex> {
    Regex::new(NULL_MARKERS).context("compiling null marker pattern")
}

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}

/// Read a whole table into a single batch.
///
/// `.parquet` files go through the parquet Arrow reader; everything else is read
/// as comma-delimited text with a header row, with the schema inferred from every
/// record in the file. Empty fields and markers such as `NA`, `N/A` or `NULL`
/// become nulls.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening table {}", path.display()))?;

    let (schema, batches) = if is_parquet(path) {
        read_parquet(file).with_context(|| format!("reading parquet {}", path.display()))?
    } else {
        read_csv(file).with_context(|| format!("reading csv {}", path.display()))?
    };

    let batch = concat_batches(&schema, &batches)
        .with_context(|| format!("concatenating batches of {}", path.display()))?;
    debug!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "table loaded"
    );
    Ok(batch)
}

fn read_csv(mut file: File) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let (schema, _) = Format::default()
        .with_header(true)
        .with_null_regex(null_markers()?)
        .infer_schema(&mut file, None)
        .context("inferring csv schema")?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_null_regex(null_markers()?)
        .with_batch_size(READ_BATCH_SIZE)
        .build(file)
        .context("creating csv reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("parsing csv records")?;
    Ok((schema, batches))
}

fn read_parquet(file: File) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(READ_BATCH_SIZE);
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

/// Write `batch` to `path`, creating the parent directory.
///
/// The file is written to `<path>.tmp` and renamed into place. On failure the
/// temp file is removed and any existing table at `path` is left as it was.
#[tracing::instrument(level = "debug", skip(path, batch), fields(path = %path.as_ref().display()))]
pub fn write_table<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    let written = write_file(&tmp, path, batch).and_then(|()| {
        fs::rename(&tmp, path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))
    });
    if let Err(e) = written {
        if let Err(rm) = fs::remove_file(&tmp) {
            debug!(tmp = %tmp.display(), error = %rm, "could not remove temp file");
        }
        return Err(e);
    }
    debug!(rows = batch.num_rows(), "table written");
    Ok(())
}

fn write_file(tmp: &Path, path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(tmp).with_context(|| format!("creating {}", tmp.display()))?;
    if is_parquet(path) {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating parquet writer")?;
        writer.write(batch).context("writing parquet batch")?;
        writer.close().context("closing parquet writer")?;
    } else {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .build(BufWriter::new(file));
        writer.write(batch).context("writing csv batch")?;
        writer.into_inner().flush().context("flushing csv writer")?;
    }
    Ok(())
}

/// First `n` rows of `batch` as a text grid, for console output.
pub fn preview(batch: &RecordBatch, n: usize) -> Result<String> {
    let head = batch.slice(0, n.min(batch.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}
