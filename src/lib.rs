//! # battery-lifetime
//!
//! Ingestion of battery-aging measurements (NASA-style per-unit cycle files)
//! into a per-unit reliability sample.
//!
//! Every file in a data directory holds the ordered charge/discharge cycles
//! of one battery unit. The loader validates each cycle history and reduces
//! it to a [`UnitSummary`]: the cycle at which capacity first falls to a
//! given fraction of its initial value, or a censoring marker when it never
//! does. Units that fail to parse are reported, not dropped.
//!
//! ```no_run
//! use battery_lifetime::extract_lifetimes_from_folder;
//!
//! let dataset = extract_lifetimes_from_folder("data/batteries", 0.7)?;
//! for unit in &dataset {
//!     println!("{}: {}", unit.unit_id, unit.lifetime);
//! }
//! for skipped in dataset.skipped() {
//!     eprintln!("skipped {}: {}", skipped.unit_id, skipped.reason);
//! }
//! # Ok::<(), battery_lifetime::LoaderError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;

pub use config::LoaderConfig;
pub use data::format::{CycleSource, FormatRegistry};
pub use data::lifetime::{ThresholdFraction, extract_lifetime};
pub use data::loader::{
    Loader, UnitFile, discover_units, extract_lifetimes_from_folder, parse_unit,
};
pub use data::model::{
    CycleRecord, Dataset, Lifetime, SkipReason, SkippedUnit, Unit, UnitSummary,
};
pub use error::LoaderError;
