//! Collaborator interfaces for object storage and the analytical query engine.
//!
//! The pipeline core only speaks these traits. `aws` binds them to S3 and
//! Athena; `memory` provides deterministic stand-ins for tests and dry runs.

use std::path::Path;

use crate::data::{ExecutionStatus, ResultPage};
use crate::errors::PipelineError;
use crate::types::{PageToken, QueryHandle};

#[cfg(feature = "aws")]
/// S3 and Athena adapters.
pub mod aws;
/// In-memory storage and scripted query engine.
pub mod memory;

/// Durable, key-addressed blob store.
pub trait ObjectStorage {
    /// Upload the file at `local_path` to `bucket/key`, overwriting any
    /// existing object under that key.
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), PipelineError>;
}

/// Remote, eventually consistent analytical query engine.
pub trait QueryEngine {
    /// Start `query` against `database`, writing result files to
    /// `output_location`. Return the execution handle.
    fn submit(
        &self,
        query: &str,
        database: &str,
        output_location: &str,
    ) -> Result<QueryHandle, PipelineError>;

    /// Fetch the current execution status.
    fn status(&self, handle: &QueryHandle) -> Result<ExecutionStatus, PipelineError>;

    /// Fetch one page of results. `token` is `None` for the first page and
    /// the previous page's `next_token` afterwards.
    fn results_page(
        &self,
        handle: &QueryHandle,
        token: Option<&PageToken>,
    ) -> Result<ResultPage, PipelineError>;
}
