//! Vendor format adapters.
//!
//! Each adapter turns an open unit file into the ordered list of
//! [`CycleRecord`]s it contains. Validation of the record sequence
//! (monotonic cycles, positive capacities) happens afterwards in
//! [`Unit::from_records`](super::model::Unit::from_records); adapters only
//! deal with container structure.

pub mod columnar;
pub mod delimited;
pub mod json;
pub mod mat;

use std::fs::File;
use std::path::Path;

use anyhow::{Result, bail};
use serde::Deserialize;

use super::model::CycleRecord;

/// Produces the cycle records stored in one unit file.
pub trait CycleSource: Send + Sync {
    /// Short format name used in log messages.
    fn name(&self) -> &'static str;

    /// Lower-case file extensions (without the dot) handled by this adapter.
    fn extensions(&self) -> &'static [&'static str];

    /// Read every cycle record from `file`, in stored order.
    fn read_cycles(&self, file: File) -> Result<Vec<CycleRecord>>;
}

// ---------------------------------------------------------------------------
// Registry: extension → adapter
// ---------------------------------------------------------------------------

/// The set of adapters a loader dispatches to, matched by file extension.
pub struct FormatRegistry {
    sources: Vec<Box<dyn CycleSource>>,
}

impl FormatRegistry {
    /// A registry without any adapter.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl CycleSource + 'static) -> Self {
        self.register(Box::new(source));
        self
    }

    /// Add an adapter. Earlier registrations win when extensions overlap.
    pub fn register(&mut self, source: Box<dyn CycleSource>) {
        self.sources.push(source);
    }

    /// Adapter for `path`, picked by its (case-insensitive) extension.
    pub fn for_path(&self, path: &Path) -> Option<&dyn CycleSource> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();

        self.sources
            .iter()
            .find(|s| s.extensions().contains(&ext.as_str()))
            .map(|s| &**s)
    }

    /// All extensions handled, in registration order.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.sources
            .iter()
            .flat_map(|s| s.extensions().iter().copied())
            .collect()
    }
}

impl Default for FormatRegistry {
    /// `.mat`, `.csv`, `.json` and `.parquet`/`.pq`.
    fn default() -> Self {
        Self::empty()
            .with_source(mat::MatSource)
            .with_source(delimited::CsvSource)
            .with_source(json::JsonSource)
            .with_source(columnar::ParquetSource)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Row layout shared by the record-oriented formats (CSV, JSON).
#[derive(Debug, Deserialize)]
pub(crate) struct CycleRow {
    cycle: f64,
    capacity: f64,
    #[serde(default)]
    impedance: Option<f64>,
    #[serde(default)]
    temperature: Option<f64>,
}

impl CycleRow {
    pub(crate) fn into_record(self, row: usize) -> Result<CycleRecord> {
        Ok(CycleRecord {
            cycle_index: cycle_index(self.cycle, row)?,
            capacity: self.capacity,
            impedance: self.impedance,
            temperature: self.temperature,
        })
    }
}

/// Column layout shared by the array-oriented formats (MAT, Parquet).
#[derive(Debug, Default)]
pub(crate) struct CycleColumns {
    pub cycle: Vec<f64>,
    pub capacity: Vec<f64>,
    pub impedance: Option<Vec<Option<f64>>>,
    pub temperature: Option<Vec<Option<f64>>>,
}

impl CycleColumns {
    pub(crate) fn into_records(self) -> Result<Vec<CycleRecord>> {
        let n = self.capacity.len();
        if self.cycle.len() != n {
            bail!(
                "'cycle' has {} values but 'capacity' has {n}",
                self.cycle.len()
            );
        }
        for (name, column) in [("impedance", &self.impedance), ("temperature", &self.temperature)] {
            if let Some(values) = column {
                if values.len() != n {
                    bail!("'{name}' has {} values but 'capacity' has {n}", values.len());
                }
            }
        }

        let optional = |column: &Option<Vec<Option<f64>>>, row: usize| {
            column.as_ref().and_then(|values| values[row])
        };

        self.cycle
            .iter()
            .zip(&self.capacity)
            .enumerate()
            .map(|(row, (&cycle, &capacity))| -> Result<CycleRecord> {
                Ok(CycleRecord {
                    cycle_index: cycle_index(cycle, row)?,
                    capacity,
                    impedance: optional(&self.impedance, row),
                    temperature: optional(&self.temperature, row),
                })
            })
            .collect()
    }
}

/// Convert a stored cycle number to an index. Only finite whole numbers ≥ 1 fit.
pub(crate) fn cycle_index(value: f64, row: usize) -> Result<u32> {
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        bail!("row {row}: cycle value {value} is not a positive whole number");
    }
    Ok(value as u32)
}
