//! Dataset acquisition interfaces.
//!
//! A `DatasetSource` materializes an external dataset into a local directory.
//! The pipeline only consumes the path of the delimited file found there.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::PipelineError;

/// Source implementation modules.
pub mod sources;

#[cfg(feature = "kaggle")]
pub use sources::kaggle::{KaggleCredentials, KaggleSource};
pub use sources::local_source::LocalDirectorySource;

/// Downloads and extracts a dataset into a local directory.
pub trait DatasetSource {
    /// Stable identifier used in logs.
    fn id(&self) -> &str;

    /// Make `dataset`'s files available under `dest_dir`, creating it if
    /// needed. Returns the directory holding the extracted files.
    fn fetch(&self, dataset: &str, dest_dir: &Path) -> Result<PathBuf, PipelineError>;
}

/// Find `file_name` under `root`, searching nested directories.
///
/// Archives often wrap their files in a folder, so a shallow lookup is not
/// enough. The shallowest match wins; ties break on path order.
pub fn locate_file(root: &Path, file_name: &str) -> Result<PathBuf, PipelineError> {
    let mut matches: Vec<(usize, PathBuf)> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| (entry.depth(), entry.into_path()))
        .collect();
    matches.sort();
    matches
        .into_iter()
        .next()
        .map(|(_, path)| path)
        .ok_or_else(|| PipelineError::DatasetUnavailable {
            dataset: file_name.to_string(),
            reason: format!("not found under {}", root.display()),
        })
}
