use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::format::FormatRegistry;
use super::lifetime::{ThresholdFraction, summarize_unit};
use super::model::{Dataset, SkipReason, SkippedUnit, Unit};
use crate::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// One discovered unit file. The unit id is the file stem (`B0005.mat` → `B0005`);
/// a stem that is not valid UTF-8 gets its invalid bytes replaced by `U+FFFD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    pub id: String,
    pub path: PathBuf,
}

/// List unit files in `dir` using the default format registry.
pub fn discover_units<P: AsRef<Path>>(dir: P) -> Result<Vec<UnitFile>> {
    Loader::default().discover_units(dir.as_ref())
}

/// Parse one unit file using the default format registry.
pub fn parse_unit(file: &UnitFile) -> Result<Unit> {
    Loader::default().parse_unit(file)
}

/// Summarise every unit in `dir` using the default format registry.
pub fn extract_lifetimes_from_folder<P: AsRef<Path>>(
    dir: P,
    threshold_fraction: f64,
) -> Result<Dataset> {
    Loader::default().extract_lifetimes_from_folder(dir.as_ref(), threshold_fraction)
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Folder-to-[`Dataset`] pipeline over a set of format adapters.
#[derive(Default)]
pub struct Loader {
    formats: FormatRegistry,
}

impl Loader {
    pub fn new(formats: FormatRegistry) -> Self {
        Self { formats }
    }

    /// Regular files directly under `dir` that some adapter can read, sorted
    /// by file name.
    ///
    /// Fails with [`LoaderError::NotFound`] when `dir` is not a readable
    /// directory or holds no such file.
    pub fn discover_units(&self, dir: &Path) -> Result<Vec<UnitFile>> {
        let not_found = |reason: String| LoaderError::NotFound {
            path: dir.to_path_buf(),
            reason,
        };

        if !dir.is_dir() {
            return Err(not_found("not an existing directory".to_string()));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| not_found(e.to_string()))?;

        let mut units = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| not_found(e.to_string()))?.path();
            if !path.is_file() || self.formats.for_path(&path).is_none() {
                continue;
            }
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            units.push(UnitFile { id, path });
        }

        if units.is_empty() {
            return Err(not_found(format!(
                "no unit files with a supported extension ({})",
                self.formats.extensions().join(", ")
            )));
        }

        units.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(units)
    }

    /// Read and validate one unit file.
    ///
    /// The file handle lives only for the duration of the adapter call.
    pub fn parse_unit(&self, file: &UnitFile) -> Result<Unit> {
        let parse_error = |reason: String| LoaderError::Parse {
            unit: file.id.clone(),
            path: file.path.clone(),
            reason,
        };

        let source = self
            .formats
            .for_path(&file.path)
            .ok_or_else(|| parse_error("no format adapter for this file extension".to_string()))?;

        let records = {
            let handle =
                File::open(&file.path).map_err(|e| parse_error(format!("opening file: {e}")))?;
            source
                .read_cycles(handle)
                .map_err(|e| parse_error(format!("{e:#}")))?
        };

        log::debug!(
            "Parsed {} cycle records for unit {} ({} format)",
            records.len(),
            file.id,
            source.name()
        );

        Unit::from_records(file.id.clone(), file.path.clone(), records)
    }

    /// Discover, parse and summarise every unit in `dir`.
    ///
    /// The threshold is checked before the directory is touched. Units that
    /// fail with [`LoaderError::Parse`] or [`LoaderError::EmptyUnit`] are
    /// logged and listed in [`Dataset::skipped`]; they never abort the batch.
    pub fn extract_lifetimes_from_folder(
        &self,
        dir: &Path,
        threshold_fraction: f64,
    ) -> Result<Dataset> {
        let threshold = ThresholdFraction::new(threshold_fraction)?;
        self.extract_with_threshold(dir, threshold)
    }

    /// [`Loader::extract_lifetimes_from_folder`] for an already validated
    /// threshold, as held by [`LoaderConfig`](crate::config::LoaderConfig).
    ///
    /// Files sharing a unit id (`B0005.mat` next to `B0005.csv`) are not
    /// parsed: each one is listed in [`Dataset::skipped`] with a
    /// [`SkipReason::Parse`] naming the other files.
    pub fn extract_with_threshold(
        &self,
        dir: &Path,
        threshold: ThresholdFraction,
    ) -> Result<Dataset> {
        let files = self.discover_units(dir)?;

        let mut by_id: HashMap<&str, Vec<&UnitFile>> = HashMap::new();
        for file in &files {
            by_id.entry(file.id.as_str()).or_default().push(file);
        }

        let mut units = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();

        for file in &files {
            let sharing = &by_id[file.id.as_str()];
            if sharing.len() > 1 {
                let others: Vec<String> = sharing
                    .iter()
                    .filter(|other| other.path != file.path)
                    .map(|other| file_name(&other.path))
                    .collect();
                let reason = format!(
                    "duplicate unit id {}: also provided by {}",
                    file.id,
                    others.join(", ")
                );
                log::warn!("Skipping unit {} ({}): {reason}", file.id, file.path.display());
                skipped.push(SkippedUnit {
                    unit_id: file.id.clone(),
                    path: file.path.clone(),
                    reason: SkipReason::Parse(reason),
                });
                continue;
            }

            match self.parse_unit(file) {
                Ok(unit) => units.push(summarize_unit(&unit, threshold)),
                Err(LoaderError::Parse { unit, path, reason }) => {
                    log::warn!("Skipping unit {unit} ({}): {reason}", path.display());
                    skipped.push(SkippedUnit {
                        unit_id: unit,
                        path,
                        reason: SkipReason::Parse(reason),
                    });
                }
                Err(LoaderError::EmptyUnit { unit, path }) => {
                    log::warn!("Skipping unit {unit} ({}): no cycle records", path.display());
                    skipped.push(SkippedUnit {
                        unit_id: unit,
                        path,
                        reason: SkipReason::Empty,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let dataset = Dataset::new(threshold, units, skipped);
        log::info!(
            "Loaded {} units from {} ({} censored, {} skipped, threshold {})",
            dataset.len(),
            dir.display(),
            dataset.censored_count(),
            dataset.skipped().len(),
            threshold
        );
        Ok(dataset)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
