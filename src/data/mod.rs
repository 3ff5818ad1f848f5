//! Data layer: cycle records, format adapters, loading, and lifetime extraction.
//!
//! Architecture:
//! ```text
//!  B0005.mat / B0006.csv / B0007.parquet / B0018.json
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  format   │  file handle → Vec<CycleRecord>  (one adapter per extension)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  discover → parse → validate → Unit
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ lifetime  │  first capacity crossing → UnitSummary
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ Dataset   │  Vec<UnitSummary> + skipped units
//!   └──────────┘
//! ```

pub mod format;
pub mod lifetime;
pub mod loader;
pub mod model;
