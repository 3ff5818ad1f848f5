use std::fs::File;

use anyhow::{Context, Result, bail};

use super::{CycleRow, CycleSource};
use crate::data::model::CycleRecord;

/// CSV layout: header row, one cycle per line.
///
/// ```text
/// cycle,capacity,impedance,temperature
/// 1,1.856,0.0701,24.3
/// 2,1.846,,24.1
/// ```
///
/// `cycle` and `capacity` are required; `impedance` and `temperature` may be
/// absent or left empty.
pub struct CsvSource;

impl CycleSource for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn read_cycles(&self, file: File) -> Result<Vec<CycleRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader.headers().context("reading CSV headers")?.clone();
        for required in ["cycle", "capacity"] {
            if !headers.iter().any(|h| h == required) {
                bail!("CSV missing '{required}' column");
            }
        }

        reader
            .deserialize::<CycleRow>()
            .enumerate()
            .map(|(row, result)| {
                result
                    .with_context(|| format!("CSV row {row}"))?
                    .into_record(row)
            })
            .collect()
    }
}
