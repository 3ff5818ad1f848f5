use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};

use super::{CycleRow, CycleSource};
use crate::data::model::CycleRecord;

/// Records-oriented JSON, as written by `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "cycle": 1, "capacity": 1.856, "impedance": 0.07, "temperature": 24.3 },
///   { "cycle": 2, "capacity": 1.846 }
/// ]
/// ```
pub struct JsonSource;

impl CycleSource for JsonSource {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn read_cycles(&self, file: File) -> Result<Vec<CycleRecord>> {
        let rows: Vec<CycleRow> = serde_json::from_reader(BufReader::new(file))
            .context("expected a top-level JSON array of cycle records")?;

        rows.into_iter()
            .enumerate()
            .map(|(row, r)| r.into_record(row))
            .collect()
    }
}
