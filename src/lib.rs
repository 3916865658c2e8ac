#![doc = include_str!("../README.md")]

/// Pipeline configuration types.
pub mod config;
/// Centralized constants seeding the configuration defaults.
pub mod constants;
/// Columnar conversion and artifact upload.
pub mod convert;
/// Tables, execution states, labels, and result pages.
pub mod data;
/// Result materializer.
pub mod materialize;
/// Classification scoring helpers.
pub mod metrics;
/// Stage orchestration.
pub mod pipeline;
/// Execution-status poller.
pub mod poller;
/// Query submission stage.
pub mod query;
/// Canonical schema normalization.
pub mod schema;
/// Dataset acquisition traits and built-in sources.
pub mod source;
/// Feature importance and classifier evaluation.
pub mod training;
/// Object storage and query engine seams (AWS and in-memory).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use config::{
    DatasetConfig, FailurePolicy, PipelineConfig, PollPolicy, QueryConfig, SchemaConfig,
    StorageConfig, TrainingConfig,
};
pub use convert::{ColumnarConverter, partition_key};
pub use data::{
    CoercionWarning, Column, ColumnData, ColumnarArtifact, ExecutionState, ExecutionStatus, Label,
    NormalizedTable, ResultPage, ResultSet, Table,
};
pub use errors::PipelineError;
pub use materialize::materialize;
pub use metrics::ClassificationMetrics;
pub use pipeline::{IngestedData, Pipeline, PipelineReport};
pub use poller::{StatusPoller, SucceededQuery};
pub use query::QueryRunner;
pub use schema::normalize;
#[cfg(feature = "kaggle")]
pub use source::{KaggleCredentials, KaggleSource};
pub use source::{DatasetSource, LocalDirectorySource, locate_file};
pub use training::{FeatureImportance, ModelTrainer, TrainingReport, split_sizes};
pub use transport::{ObjectStorage, QueryEngine};
pub use types::{
    BucketName, Cell, ColumnName, DatabaseName, DatasetId, ObjectKey, PageToken, QueryHandle,
};
