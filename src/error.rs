use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the dataset loader.
///
/// `NotFound` and `InvalidConfig` abort a run. `Parse` and `EmptyUnit` concern
/// a single unit file; [`extract_lifetimes_from_folder`] records them as
/// skipped units and keeps going.
///
/// [`extract_lifetimes_from_folder`]: crate::data::loader::extract_lifetimes_from_folder
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("dataset not found at {}: {reason}", .path.display())]
    NotFound { path: PathBuf, reason: String },

    #[error("unit {unit} ({}): {reason}", .path.display())]
    Parse {
        unit: String,
        path: PathBuf,
        reason: String,
    },

    #[error("unit {unit} ({}) contains no cycle records", .path.display())]
    EmptyUnit { unit: String, path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
