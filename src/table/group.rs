use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray, UInt32Array},
    compute::{cast, take, take_record_batch},
    datatypes::{DataType, Field, Float64Type},
    record_batch::RecordBatch,
    util::display::{ArrayFormatter, FormatOptions},
};
use std::{cmp::Ordering, collections::BTreeMap};

use super::columns::column;

/// One cell of a grouping key.
///
/// Numbers compare by value regardless of their Arrow width, so an `Int64` year
/// from one table joins an `Float64` year from another. Numbers sort before text.
#[derive(Debug, Clone)]
pub enum KeyValue {
    Number(f64),
    Text(String),
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Number(a), KeyValue::Number(b)) => a.total_cmp(b),
            (KeyValue::Number(_), KeyValue::Text(_)) => Ordering::Less,
            (KeyValue::Text(_), KeyValue::Number(_)) => Ordering::Greater,
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
        }
    }
}

fn key_cells(arr: &ArrayRef) -> Result<Vec<Option<KeyValue>>> {
    let dt = arr.data_type();
    if dt.is_integer() || dt.is_floating() {
        let widened = cast(arr.as_ref(), &DataType::Float64)?;
        return Ok(widened
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map(KeyValue::Number))
            .collect());
    }
    let fmt = ArrayFormatter::try_new(arr.as_ref(), &FormatOptions::default())?;
    Ok((0..arr.len())
        .map(|i| (!arr.is_null(i)).then(|| KeyValue::Text(fmt.value(i).to_string())))
        .collect())
}

/// Composite key of every row; `None` where any key column is null.
pub fn row_keys(batch: &RecordBatch, keys: &[&str]) -> Result<Vec<Option<Vec<KeyValue>>>> {
    let cells = keys
        .iter()
        .map(|k| key_cells(column(batch, k)?).with_context(|| format!("grouping by `{}`", k)))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..batch.num_rows())
        .map(|row| cells.iter().map(|c| c[row].clone()).collect())
        .collect())
}

/// Rows sharing one key, in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Vec<KeyValue>,
    pub rows: Vec<u32>,
}

/// Group row indices by `keys`, ascending by key. Rows with a null key are dropped.
pub fn group_rows(batch: &RecordBatch, keys: &[&str]) -> Result<Vec<Group>> {
    let mut groups: BTreeMap<Vec<KeyValue>, Vec<u32>> = BTreeMap::new();
    for (row, key) in row_keys(batch, keys)?.into_iter().enumerate() {
        if let Some(key) = key {
            groups.entry(key).or_default().push(row as u32);
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, rows)| Group { key, rows })
        .collect())
}

/// Key columns of the grouped output: the first row of each group, in the
/// input's own type.
pub fn key_columns(
    batch: &RecordBatch,
    keys: &[&str],
    groups: &[Group],
) -> Result<Vec<(Field, ArrayRef)>> {
    let firsts = UInt32Array::from_iter_values(groups.iter().map(|g| g.rows[0]));
    let schema = batch.schema();
    keys.iter()
        .map(|k| {
            let field = schema.field_with_name(k)?.clone();
            let values = take(column(batch, k)?.as_ref(), &firsts, None)?;
            Ok((field, values))
        })
        .collect()
}

/// Sum of the present values in `rows`; 0 when none are present.
pub fn sum(values: &[Option<f64>], rows: &[u32]) -> f64 {
    rows.iter().filter_map(|&r| values[r as usize]).sum()
}

/// Mean of the values in `rows`, skipping nulls and NaN. Infinities take part.
pub fn mean(values: &[Option<f64>], rows: &[u32]) -> Option<f64> {
    let present: Vec<f64> = rows
        .iter()
        .filter_map(|&r| values[r as usize])
        .filter(|v| !v.is_nan())
        .collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Row order that sorts `values`; missing and NaN values go last either way.
/// Ties keep their input order.
pub fn order_by(values: &[Option<f64>], descending: bool) -> Vec<u32> {
    let mut idx: Vec<u32> = (0..values.len() as u32).collect();
    idx.sort_by(|&a, &b| {
        let a = values[a as usize].filter(|v| !v.is_nan());
        let b = values[b as usize].filter(|v| !v.is_nan());
        match (a, b) {
            (Some(a), Some(b)) if descending => b.total_cmp(&a),
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    idx
}

/// Reorder `batch` by the named float column.
pub fn sort_by_column(batch: &RecordBatch, name: &str, descending: bool) -> Result<RecordBatch> {
    let values = super::columns::float_values(batch, name)?;
    let order = UInt32Array::from(order_by(&values, descending));
    take_record_batch(batch, &order).with_context(|| format!("sorting by `{}`", name))
}
