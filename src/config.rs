use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::data::lifetime::ThresholdFraction;
use crate::data::loader::Loader;
use crate::data::model::Dataset;
use crate::error::Result;

/// Prefix for environment overrides, e.g. `BATTERY_THRESHOLD_FRACTION=0.8`.
pub const ENV_PREFIX: &str = "BATTERY";

/// Settings for one extraction run.
///
/// `threshold_fraction` has no default and is validated while deserializing,
/// so a config file with `threshold_fraction = 1.5` fails to load.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Directory holding one file per battery unit.
    pub data_dir: PathBuf,
    pub threshold_fraction: ThresholdFraction,
}

impl LoaderConfig {
    pub fn new(data_dir: impl Into<PathBuf>, threshold_fraction: f64) -> Result<Self> {
        Ok(Self {
            data_dir: data_dir.into(),
            threshold_fraction: ThresholdFraction::new(threshold_fraction)?,
        })
    }

    /// Load from a TOML/JSON/YAML file (format picked by extension), with
    /// `BATTERY_*` environment variables taking precedence.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("reading loader config {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid loader config {}", path.display()))
    }

    /// Run the folder extraction with these settings and the default formats.
    pub fn extract(&self) -> Result<Dataset> {
        Loader::default().extract_with_threshold(&self.data_dir, self.threshold_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderError;

    fn write_config(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_toml_config() {
        let (_dir, path) = write_config(
            "loader.toml",
            "data_dir = \"/data/nasa\"\nthreshold_fraction = 0.7\n",
        );

        let config = LoaderConfig::from_file(&path).unwrap();
        assert_eq!(config, LoaderConfig::new("/data/nasa", 0.7).unwrap());
    }

    #[test]
    fn loads_json_config() {
        let (_dir, path) = write_config(
            "loader.json",
            r#"{"data_dir": "batteries", "threshold_fraction": 0.8}"#,
        );

        let config = LoaderConfig::from_file(&path).unwrap();
        assert_eq!(config.threshold_fraction.value(), 0.8);
        assert_eq!(config.data_dir, PathBuf::from("batteries"));
    }

    #[test]
    fn out_of_range_threshold_fails_to_load() {
        let (_dir, path) = write_config(
            "loader.toml",
            "data_dir = \"/data/nasa\"\nthreshold_fraction = 1.5\n",
        );
        assert!(LoaderConfig::from_file(&path).is_err());
    }

    #[test]
    fn threshold_has_no_default() {
        let (_dir, path) = write_config("loader.toml", "data_dir = \"/data/nasa\"\n");
        assert!(LoaderConfig::from_file(&path).is_err());
    }

    #[test]
    fn new_validates_threshold() {
        assert!(matches!(
            LoaderConfig::new("/data/nasa", 0.0),
            Err(LoaderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn extract_runs_the_folder_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("B0005.csv"),
            "cycle,capacity\n1,2.0\n2,1.8\n3,1.5\n",
        )
        .unwrap();

        let config = LoaderConfig::new(dir.path(), 0.8).unwrap();
        let ds = config.extract().unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.units()[0].lifetime.cycle(), Some(3));
    }
}
