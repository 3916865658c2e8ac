use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::data::ExecutionState;
use crate::types::{ObjectKey, QueryHandle};

/// Error type for conversion, storage, query execution, and training failures.
///
/// Every variant is fatal to a pipeline run. Non-fatal coercion problems are
/// reported as [`crate::data::CoercionWarning`] values instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to parse '{source_name}': {reason}")]
    Parse { source_name: String, reason: String },
    #[error("object storage failure for '{key}': {reason}")]
    Storage { key: ObjectKey, reason: String },
    #[error("query submission rejected: {0}")]
    Submission(String),
    #[error("query engine call failed for '{handle}': {reason}")]
    Engine { handle: QueryHandle, reason: String },
    #[error("query '{handle}' finished as {state}: {reason}")]
    ExecutionFailure {
        handle: QueryHandle,
        state: ExecutionState,
        reason: String,
    },
    #[error("query '{handle}' still running after {attempts} status checks ({elapsed:?})")]
    Timeout {
        handle: QueryHandle,
        attempts: usize,
        elapsed: Duration,
    },
    #[error("schema error: {0}")]
    Schema(String),
    #[error("training failed: {0}")]
    Training(String),
    #[error("dataset '{dataset}' is unavailable: {reason}")]
    DatasetUnavailable { dataset: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub(crate) fn parse(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn storage(key: impl Into<ObjectKey>, reason: impl ToString) -> Self {
        Self::Storage {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn engine(handle: &QueryHandle, reason: impl ToString) -> Self {
        Self::Engine {
            handle: handle.clone(),
            reason: reason.to_string(),
        }
    }
}
