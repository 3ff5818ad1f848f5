use std::fs::File;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int32Type, Int64Type, UInt32Type,
};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{CycleColumns, CycleSource};
use crate::data::model::CycleRecord;

/// Parquet file with one row per cycle.
///
/// Expected schema:
/// - `cycle`: Int32 / Int64 / UInt32 / Float64 – cycle number
/// - `capacity`: Float64 / Float32
/// - `impedance`, `temperature`: optional numeric columns; nulls are allowed
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
pub struct ParquetSource;

impl CycleSource for ParquetSource {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["parquet", "pq"]
    }

    fn read_cycles(&self, file: File) -> Result<Vec<CycleRecord>> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("reading parquet metadata")?;
        let reader = builder.build().context("building parquet reader")?;

        let mut columns = CycleColumns::default();

        for batch_result in reader {
            let batch = batch_result.context("reading parquet record batch")?;

            columns.cycle.extend(required_column(&batch, "cycle")?);
            columns.capacity.extend(required_column(&batch, "capacity")?);
            extend_optional(&mut columns.impedance, &batch, "impedance")?;
            extend_optional(&mut columns.temperature, &batch, "temperature")?;
        }

        columns.into_records()
    }
}

// -- Arrow helpers --

fn required_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let col = batch
        .column_by_name(name)
        .with_context(|| format!("Parquet file missing '{name}' column"))?;

    numeric_values(col, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.with_context(|| format!("Row {row}: null value in '{name}'")))
        .collect()
}

fn extend_optional(
    target: &mut Option<Vec<Option<f64>>>,
    batch: &RecordBatch,
    name: &str,
) -> Result<()> {
    if let Some(col) = batch.column_by_name(name) {
        target
            .get_or_insert_with(Vec::new)
            .extend(numeric_values(col, name)?);
    }
    Ok(())
}

/// Widen a numeric Arrow column to `f64`, keeping nulls.
fn numeric_values(col: &ArrayRef, name: &str) -> Result<Vec<Option<f64>>> {
    let values: Vec<Option<f64>> = match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().iter().collect(),
        DataType::Float32 => col
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map(f64::from))
            .collect(),
        DataType::Int64 => col
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map(|i| i as f64))
            .collect(),
        DataType::Int32 => col
            .as_primitive::<Int32Type>()
            .iter()
            .map(|v| v.map(f64::from))
            .collect(),
        DataType::UInt32 => col
            .as_primitive::<UInt32Type>()
            .iter()
            .map(|v| v.map(f64::from))
            .collect(),
        other => bail!("Column '{name}' has type {other:?}, expected a numeric type"),
    };
    Ok(values)
}
