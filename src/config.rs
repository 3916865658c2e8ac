use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::{dataset, poller, query, schema, storage, training};
use crate::errors::PipelineError;
use crate::types::{BucketName, ColumnName, DatabaseName, DatasetId};

/// Where the raw dataset comes from and how its file is laid out.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// External dataset identifier.
    pub dataset_id: DatasetId,
    /// Directory the dataset is extracted into.
    pub download_dir: PathBuf,
    /// File name of the delimited source inside `download_dir`.
    pub file_name: String,
    /// Leading columns kept from each row; the rest are discarded.
    pub column_count: usize,
    /// Field delimiter.
    pub delimiter: u8,
    /// WHATWG encoding label used to decode the file.
    pub encoding: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset_id: dataset::DATASET_ID.to_string(),
            download_dir: PathBuf::from(dataset::DOWNLOAD_DIR),
            file_name: dataset::CSV_FILE_NAME.to_string(),
            column_count: dataset::SOURCE_COLUMN_COUNT,
            delimiter: dataset::DELIMITER,
            encoding: dataset::SOURCE_ENCODING.to_string(),
        }
    }
}

/// Object storage target for the daily artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: BucketName,
    /// Logical folder prefix of the artifact key.
    pub prefix: String,
    /// File stem placed before the partition date.
    pub stem: String,
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: storage::BUCKET.to_string(),
            prefix: storage::ARTIFACT_PREFIX.to_string(),
            stem: storage::ARTIFACT_STEM.to_string(),
            extension: storage::ARTIFACT_EXTENSION.to_string(),
        }
    }
}

/// Fixed query submitted to the analytical engine.
///
/// Changing the analyzed dataset means changing this value, never the call site.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryConfig {
    pub region: String,
    pub database: DatabaseName,
    pub query: String,
    /// Scratch location the engine requires for result files.
    pub output_location: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            region: query::REGION.to_string(),
            database: query::DATABASE.to_string(),
            query: query::QUERY.to_string(),
            output_location: query::OUTPUT_LOCATION.to_string(),
        }
    }
}

/// What the poller does when the engine reports `FAILED` or `CANCELLED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop immediately and return an execution failure.
    Stop,
    /// Log the terminal failure and keep polling until a limit is hit.
    KeepPolling,
}

/// Status polling behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Fixed delay between two status checks.
    pub interval: Duration,
    /// Max status checks before giving up; `None` means unbounded.
    pub max_attempts: Option<usize>,
    /// Wall-clock budget; `None` means unbounded.
    pub timeout: Option<Duration>,
    pub on_failure: FailurePolicy,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(poller::POLL_INTERVAL_MS),
            max_attempts: None,
            timeout: Some(Duration::from_secs(poller::POLL_TIMEOUT_SECS)),
            on_failure: FailurePolicy::Stop,
        }
    }
}

impl PollPolicy {
    /// Reject attempt caps of zero.
    pub fn validated(self) -> Result<Self, PipelineError> {
        if self.max_attempts == Some(0) {
            return Err(PipelineError::Configuration(
                "poll max_attempts must be > 0".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Column renames and derived-label settings for the normalizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Exact, case-sensitive source -> canonical renames.
    pub renames: IndexMap<ColumnName, ColumnName>,
    /// Canonical columns coerced from text to numbers.
    pub numeric_columns: Vec<ColumnName>,
    /// Column after which the label column is inserted.
    pub age_column: ColumnName,
    /// Outcome column the label is derived from.
    pub target_column: ColumnName,
    /// Name of the derived label column.
    pub label_column: ColumnName,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            renames: schema::COLUMN_RENAMES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            numeric_columns: schema::COLUMN_RENAMES
                .iter()
                .map(|(_, to)| to.to_string())
                .collect(),
            age_column: schema::AGE_COLUMN.to_string(),
            target_column: schema::TARGET_COLUMN.to_string(),
            label_column: schema::LABEL_COLUMN.to_string(),
        }
    }
}

/// Model training and evaluation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Feature columns, in order.
    pub feature_columns: Vec<ColumnName>,
    /// RNG seed for the train/test shuffle.
    pub split_seed: u64,
    /// Fraction of rows held out for evaluation.
    pub test_ratio: f64,
    pub logistic_max_iterations: u64,
    /// Trees in the feature-importance ensemble.
    pub forest_trees: usize,
    /// RNG seed for bootstrap resampling.
    pub forest_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            feature_columns: schema::FEATURE_COLUMNS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            split_seed: training::SPLIT_SEED,
            test_ratio: training::TEST_RATIO,
            logistic_max_iterations: training::LOGISTIC_MAX_ITERATIONS,
            forest_trees: training::FOREST_TREES,
            forest_seed: training::FOREST_SEED,
        }
    }
}

impl TrainingConfig {
    /// Validate split ratio, tree count, and feature list.
    pub fn validated(self) -> Result<Self, PipelineError> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(PipelineError::Configuration(
                "test_ratio must be within (0, 1)".to_string(),
            ));
        }
        if self.forest_trees == 0 {
            return Err(PipelineError::Configuration(
                "forest_trees must be > 0".to_string(),
            ));
        }
        if self.feature_columns.is_empty() {
            return Err(PipelineError::Configuration(
                "feature_columns must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Top-level pipeline configuration, passed into each stage at construction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub poll: PollPolicy,
    pub schema: SchemaConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    /// Validate every section; returns the config unchanged on success.
    pub fn validated(self) -> Result<Self, PipelineError> {
        if self.dataset.column_count == 0 {
            return Err(PipelineError::Configuration(
                "dataset column_count must be > 0".to_string(),
            ));
        }
        if self.storage.bucket.is_empty() {
            return Err(PipelineError::Configuration(
                "storage bucket must not be empty".to_string(),
            ));
        }
        if self.query.query.trim().is_empty() || self.query.database.is_empty() {
            return Err(PipelineError::Configuration(
                "query text and database must not be empty".to_string(),
            ));
        }
        let poll = self.poll.validated()?;
        let training = self.training.validated()?;
        Ok(Self {
            poll,
            training,
            ..self
        })
    }
}
