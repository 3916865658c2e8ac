use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::PipelineError;
use crate::source::DatasetSource;

/// Serves a dataset that is already present on disk.
///
/// `fetch` ignores the destination and returns the configured root, which
/// must exist.
#[derive(Clone, Debug)]
pub struct LocalDirectorySource {
    root: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DatasetSource for LocalDirectorySource {
    fn id(&self) -> &str {
        "local"
    }

    fn fetch(&self, dataset: &str, _dest_dir: &Path) -> Result<PathBuf, PipelineError> {
        if !self.root.is_dir() {
            return Err(PipelineError::DatasetUnavailable {
                dataset: dataset.to_string(),
                reason: format!("{} is not a directory", self.root.display()),
            });
        }
        info!(
            "[diabetes-lake:source] using local copy of {dataset} at {}",
            self.root.display()
        );
        Ok(self.root.clone())
    }
}
