use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray, Float64Array, GenericStringArray, OffsetSizeTrait},
    compute::cast,
    datatypes::{DataType, Field, Float64Type, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
    util::display::{ArrayFormatter, FormatOptions},
};
use std::sync::Arc;

/// Look up a column by name, failing with the column name and what is available.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch.column_by_name(name).ok_or_else(|| {
        let available: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        anyhow!("missing column `{}` (have: {})", name, available.join(", "))
    })
}

pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

/// Integer and floating point columns; these are the ones the cleaner imputes.
pub fn is_numeric(dt: &DataType) -> bool {
    dt.is_integer() || dt.is_floating()
}

/// Named column as `f64`s. Integer and float columns are widened; text columns are
/// parsed, which is how `inf`/`NaN` values come back from a CSV file.
pub fn float_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    array_to_f64(column(batch, name)?).with_context(|| format!("reading column `{}`", name))
}

pub fn array_to_f64(arr: &ArrayRef) -> Result<Vec<Option<f64>>> {
    match arr.data_type() {
        DataType::Null => Ok(vec![None; arr.len()]),
        DataType::Utf8 => parse_text(arr.as_string::<i32>()),
        DataType::LargeUtf8 => parse_text(arr.as_string::<i64>()),
        dt if dt.is_numeric() => {
            let widened = cast(arr, &DataType::Float64)?;
            Ok(widened.as_primitive::<Float64Type>().iter().collect())
        }
        other => bail!("expected a numeric column, found {}", other),
    }
}

fn parse_text<O: OffsetSizeTrait>(arr: &GenericStringArray<O>) -> Result<Vec<Option<f64>>> {
    arr.iter()
        .map(|v| match v.map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse::<f64>()
                .map(Some)
                .map_err(|_| anyhow!("`{}` is not a number", s)),
        })
        .collect()
}

/// Named column rendered as display strings; nulls stay `None`.
pub fn text_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let arr = column(batch, name)?;
    let fmt = ArrayFormatter::try_new(arr.as_ref(), &FormatOptions::default())?;
    Ok((0..arr.len())
        .map(|i| (!arr.is_null(i)).then(|| fmt.value(i).to_string()))
        .collect())
}

pub fn float_array(values: Vec<Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values))
}

/// Assemble a batch from named columns, keeping `num_rows` even with no columns.
pub fn build_batch(columns: Vec<(Field, ArrayRef)>, num_rows: usize) -> Result<RecordBatch> {
    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns.into_iter().unzip();
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .context("assembling record batch")
}

/// The batch's columns as owned `(Field, ArrayRef)` pairs, ready to edit and rebuild.
pub fn columns_of(batch: &RecordBatch) -> Vec<(Field, ArrayRef)> {
    batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(f, a)| (f.as_ref().clone(), a.clone()))
        .collect()
}

/// Replace the column called `name`, or append it when absent.
pub fn with_float_column(
    batch: &RecordBatch,
    name: &str,
    values: Vec<Option<f64>>,
) -> Result<RecordBatch> {
    let mut columns = columns_of(batch);
    let field = Field::new(name, DataType::Float64, true);
    let array = float_array(values);
    match columns.iter().position(|(f, _)| f.name() == name) {
        Some(i) => columns[i] = (field, array),
        None => columns.push((field, array)),
    }
    build_batch(columns, batch.num_rows())
}
