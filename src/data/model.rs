use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::lifetime::ThresholdFraction;
use crate::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// CycleRecord – one charge/discharge cycle
// ---------------------------------------------------------------------------

/// One charge/discharge cycle of a single battery unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    /// Source cycle number (1-based, strictly increasing within a unit).
    pub cycle_index: u32,
    /// Measured capacity at this cycle (Ah).
    pub capacity: f64,
    pub impedance: Option<f64>,
    pub temperature: Option<f64>,
}

impl CycleRecord {
    pub fn new(cycle_index: u32, capacity: f64) -> Self {
        Self {
            cycle_index,
            capacity,
            impedance: None,
            temperature: None,
        }
    }

    pub fn with_impedance(mut self, impedance: f64) -> Self {
        self.impedance = Some(impedance);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ---------------------------------------------------------------------------
// Unit – a validated cycle history, alive only during extraction
// ---------------------------------------------------------------------------

/// A battery unit's validated cycle history.
///
/// Holds at least one record; cycle indices are strictly increasing and every
/// capacity is a positive finite number.
#[derive(Debug, Clone)]
pub struct Unit {
    id: String,
    source: PathBuf,
    records: Vec<CycleRecord>,
}

impl Unit {
    /// Validate `records` and wrap them as a unit.
    ///
    /// Zero records yields [`LoaderError::EmptyUnit`]; anything out of range or
    /// out of order yields [`LoaderError::Parse`]. Records are never reordered
    /// or clamped.
    pub fn from_records(
        id: impl Into<String>,
        source: impl Into<PathBuf>,
        records: Vec<CycleRecord>,
    ) -> Result<Self> {
        let id = id.into();
        let source = source.into();

        if records.is_empty() {
            return Err(LoaderError::EmptyUnit {
                unit: id,
                path: source,
            });
        }
        if let Err(reason) = validate_records(&records) {
            return Err(LoaderError::Parse {
                unit: id,
                path: source,
                reason,
            });
        }

        Ok(Self {
            id,
            source,
            records,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// File the unit was parsed from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    pub fn first(&self) -> &CycleRecord {
        &self.records[0]
    }

    pub fn last(&self) -> &CycleRecord {
        &self.records[self.records.len() - 1]
    }

    /// Number of cycle records; never zero.
    pub fn cycle_count(&self) -> usize {
        self.records.len()
    }
}

fn validate_records(records: &[CycleRecord]) -> std::result::Result<(), String> {
    let mut previous: Option<u32> = None;

    for (pos, rec) in records.iter().enumerate() {
        if rec.cycle_index == 0 {
            return Err(format!("record {pos}: cycle index must be positive"));
        }
        if let Some(prev) = previous {
            if rec.cycle_index <= prev {
                return Err(format!(
                    "record {pos}: cycle index {} follows {prev}, indices must be strictly increasing",
                    rec.cycle_index
                ));
            }
        }
        if !(rec.capacity.is_finite() && rec.capacity > 0.0) {
            return Err(format!(
                "cycle {}: capacity {} is not a positive finite value",
                rec.cycle_index, rec.capacity
            ));
        }
        for (field, value) in [("impedance", rec.impedance), ("temperature", rec.temperature)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(format!("cycle {}: {field} is not finite", rec.cycle_index));
            }
        }
        previous = Some(rec.cycle_index);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Lifetime / UnitSummary – derived per-unit features
// ---------------------------------------------------------------------------

/// End-of-life outcome of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lifetime {
    /// Capacity reached the end-of-life threshold at `cycle`.
    Failed { cycle: u32 },
    /// Threshold never reached; the true lifetime exceeds `last_observed_cycle`.
    Censored { last_observed_cycle: u32 },
}

impl Lifetime {
    /// The failure cycle, or `None` when censored.
    pub fn cycle(&self) -> Option<u32> {
        match self {
            Lifetime::Failed { cycle } => Some(*cycle),
            Lifetime::Censored { .. } => None,
        }
    }

    pub fn is_censored(&self) -> bool {
        matches!(self, Lifetime::Censored { .. })
    }

    /// Observed time on test: the failure cycle or the censoring cycle.
    pub fn observed_cycles(&self) -> u32 {
        match self {
            Lifetime::Failed { cycle } => *cycle,
            Lifetime::Censored {
                last_observed_cycle,
            } => *last_observed_cycle,
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Failed { cycle } => write!(f, "{cycle}"),
            Lifetime::Censored {
                last_observed_cycle,
            } => write!(f, ">{last_observed_cycle} (censored)"),
        }
    }
}

/// Scalar reliability features derived from one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub unit_id: String,
    pub lifetime: Lifetime,
    pub initial_capacity: f64,
    pub final_capacity: f64,
    /// Number of cycle records the unit was observed for.
    pub cycles_observed: usize,
    /// Capacity relative to `initial_capacity`, one entry per record.
    pub fade_curve: Vec<f64>,
    /// Last minus first impedance, when both ends carry a reading.
    pub impedance_rise: Option<f64>,
}

// ---------------------------------------------------------------------------
// Skipped units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SkipReason {
    Parse(String),
    Empty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Parse(msg) => write!(f, "parse error: {msg}"),
            SkipReason::Empty => write!(f, "no cycle records"),
        }
    }
}

/// A unit file that could not be turned into a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub unit_id: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

// ---------------------------------------------------------------------------
// Dataset – the complete extraction result
// ---------------------------------------------------------------------------

/// Per-unit summaries in discovery order, plus the units that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    threshold_fraction: ThresholdFraction,
    units: Vec<UnitSummary>,
    skipped: Vec<SkippedUnit>,
}

impl Dataset {
    pub fn new(
        threshold_fraction: ThresholdFraction,
        units: Vec<UnitSummary>,
        skipped: Vec<SkippedUnit>,
    ) -> Self {
        Self {
            threshold_fraction,
            units,
            skipped,
        }
    }

    /// Threshold the summaries were extracted with.
    pub fn threshold_fraction(&self) -> ThresholdFraction {
        self.threshold_fraction
    }

    pub fn units(&self) -> &[UnitSummary] {
        &self.units
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UnitSummary> {
        self.units.iter()
    }

    pub fn skipped(&self) -> &[SkippedUnit] {
        &self.skipped
    }

    /// Number of summarised units (skipped units excluded).
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, unit_id: &str) -> Option<&UnitSummary> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }

    pub fn censored_units(&self) -> impl Iterator<Item = &UnitSummary> {
        self.units.iter().filter(|u| u.lifetime.is_censored())
    }

    pub fn censored_count(&self) -> usize {
        self.censored_units().count()
    }

    /// Failure cycles of the fully observed units only.
    ///
    /// Censored units are left out here; use [`Dataset::survival_pairs`] when
    /// the analysis must account for them.
    pub fn observed_lifetimes(&self) -> Vec<u32> {
        self.units.iter().filter_map(|u| u.lifetime.cycle()).collect()
    }

    /// `(time, is_censored)` pairs for every summarised unit.
    pub fn survival_pairs(&self) -> Vec<(u32, bool)> {
        self.units
            .iter()
            .map(|u| (u.lifetime.observed_cycles(), u.lifetime.is_censored()))
            .collect()
    }

    pub fn initial_capacities(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.initial_capacity).collect()
    }

    pub fn final_capacities(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.final_capacity).collect()
    }

    /// Cache the dataset as pretty-printed JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("creating dataset cache {:?}", path.as_ref()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("writing dataset cache")?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(&path)
            .with_context(|| format!("opening dataset cache {:?}", path.as_ref()))?;
        let dataset = serde_json::from_reader(BufReader::new(file))
            .context("parsing dataset cache")?;
        Ok(dataset)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a UnitSummary;
    type IntoIter = std::slice::Iter<'a, UnitSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(capacities: &[f64]) -> Vec<CycleRecord> {
        capacities
            .iter()
            .enumerate()
            .map(|(i, &c)| CycleRecord::new(i as u32 + 1, c))
            .collect()
    }

    #[test]
    fn empty_unit_is_rejected() {
        let err = Unit::from_records("B0001", "B0001.csv", Vec::new()).unwrap_err();
        assert!(matches!(err, LoaderError::EmptyUnit { ref unit, .. } if unit == "B0001"));
    }

    #[test]
    fn duplicate_cycle_index_is_a_parse_error() {
        let recs = vec![CycleRecord::new(1, 2.0), CycleRecord::new(1, 1.9)];
        let err = Unit::from_records("B0002", "B0002.csv", recs).unwrap_err();
        match err {
            LoaderError::Parse { unit, reason, .. } => {
                assert_eq!(unit, "B0002");
                assert!(reason.contains("strictly increasing"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decreasing_cycle_index_is_not_reordered() {
        let recs = vec![
            CycleRecord::new(1, 2.0),
            CycleRecord::new(3, 1.9),
            CycleRecord::new(2, 1.8),
        ];
        assert!(matches!(
            Unit::from_records("B0003", "B0003.csv", recs),
            Err(LoaderError::Parse { .. })
        ));
    }

    #[test]
    fn non_positive_or_nan_capacity_is_a_parse_error() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let recs = vec![CycleRecord::new(1, 2.0), CycleRecord::new(2, bad)];
            assert!(
                matches!(
                    Unit::from_records("B0004", "B0004.csv", recs),
                    Err(LoaderError::Parse { .. })
                ),
                "capacity {bad} accepted"
            );
        }
    }

    #[test]
    fn zero_cycle_index_is_a_parse_error() {
        let recs = vec![CycleRecord::new(0, 2.0)];
        assert!(matches!(
            Unit::from_records("B0005", "B0005.csv", recs),
            Err(LoaderError::Parse { .. })
        ));
    }

    #[test]
    fn valid_unit_keeps_records_in_order() {
        let unit = Unit::from_records("B0006", "B0006.csv", records(&[2.0, 1.9, 1.8])).unwrap();
        assert_eq!(unit.cycle_count(), 3);
        assert_eq!(unit.first().cycle_index, 1);
        assert_eq!(unit.last().capacity, 1.8);
        assert_eq!(unit.source(), Path::new("B0006.csv"));
    }

    #[test]
    fn lifetime_accessors() {
        let failed = Lifetime::Failed { cycle: 42 };
        let censored = Lifetime::Censored {
            last_observed_cycle: 168,
        };
        assert_eq!(failed.cycle(), Some(42));
        assert_eq!(censored.cycle(), None);
        assert!(censored.is_censored());
        assert_eq!(censored.observed_cycles(), 168);
        assert_eq!(censored.to_string(), ">168 (censored)");
    }

    fn summary(id: &str, lifetime: Lifetime, initial: f64) -> UnitSummary {
        UnitSummary {
            unit_id: id.to_string(),
            lifetime,
            initial_capacity: initial,
            final_capacity: initial * 0.6,
            cycles_observed: 10,
            fade_curve: vec![1.0, 0.6],
            impedance_rise: None,
        }
    }

    fn sample_dataset() -> Dataset {
        Dataset::new(
            ThresholdFraction::new(0.7).unwrap(),
            vec![
                summary("B0005", Lifetime::Failed { cycle: 120 }, 1.86),
                summary(
                    "B0006",
                    Lifetime::Censored {
                        last_observed_cycle: 168,
                    },
                    2.03,
                ),
                summary("B0007", Lifetime::Failed { cycle: 95 }, 1.89),
            ],
            vec![SkippedUnit {
                unit_id: "B0018".to_string(),
                path: PathBuf::from("B0018.mat"),
                reason: SkipReason::Parse("truncated".to_string()),
            }],
        )
    }

    #[test]
    fn censored_units_stay_in_the_accounting() {
        let ds = sample_dataset();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.censored_count(), 1);
        assert_eq!(ds.observed_lifetimes(), vec![120, 95]);
        assert_eq!(
            ds.survival_pairs(),
            vec![(120, false), (168, true), (95, false)]
        );
        assert_eq!(ds.initial_capacities(), vec![1.86, 2.03, 1.89]);
        assert_eq!(ds.get("B0006").map(|u| u.cycles_observed), Some(10));
        assert_eq!(ds.skipped().len(), 1);
    }

    #[test]
    fn json_cache_preserves_the_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");

        let ds = sample_dataset();
        ds.save_json(&path).unwrap();
        let loaded = Dataset::load_json(&path).unwrap();

        assert_eq!(loaded, ds);
    }

    #[test]
    fn cache_with_out_of_range_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(
            &path,
            r#"{"threshold_fraction": 1.5, "units": [], "skipped": []}"#,
        )
        .unwrap();

        assert!(Dataset::load_json(&path).is_err());
    }
}
