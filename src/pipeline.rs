//! End-to-end orchestration.
//!
//! Stages run strictly in order: acquire, convert and upload, submit, poll,
//! materialize, normalize, train. Any fatal error stops the run.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::constants::PREVIEW_ROWS;
use crate::convert::ColumnarConverter;
use crate::data::{ColumnarArtifact, NormalizedTable};
use crate::errors::PipelineError;
use crate::materialize::materialize;
use crate::poller::StatusPoller;
use crate::query::QueryRunner;
use crate::schema::normalize;
use crate::source::{DatasetSource, locate_file};
use crate::training::{ModelTrainer, TrainingReport};
use crate::transport::{ObjectStorage, QueryEngine};
use crate::types::QueryHandle;

/// Everything a run produced up to the normalized table.
#[derive(Clone, Debug)]
pub struct IngestedData {
    pub artifact: ColumnarArtifact,
    pub handle: QueryHandle,
    pub poll_attempts: usize,
    /// Data rows returned by the engine, header row excluded.
    pub result_rows: usize,
    pub table: NormalizedTable,
}

/// Serializable summary of a complete run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub artifact: ColumnarArtifact,
    pub handle: QueryHandle,
    pub poll_attempts: usize,
    pub result_rows: usize,
    pub coercion_warnings: usize,
    pub training: TrainingReport,
}

/// Wires the stages to their external collaborators.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    source: &'a dyn DatasetSource,
    storage: &'a dyn ObjectStorage,
    engine: &'a dyn QueryEngine,
}

impl<'a> Pipeline<'a> {
    /// Build a pipeline; `config` is validated here.
    pub fn new(
        config: PipelineConfig,
        source: &'a dyn DatasetSource,
        storage: &'a dyn ObjectStorage,
        engine: &'a dyn QueryEngine,
    ) -> Result<Self, PipelineError> {
        let config = config.validated()?;
        if let Ok(json) = serde_json::to_string(&config) {
            debug!("[diabetes-lake:pipeline] effective config {json}");
        }
        Ok(Self {
            config,
            source,
            storage,
            engine,
        })
    }

    /// Fetch the dataset and return the path of the delimited source file.
    pub fn acquire(&self) -> Result<PathBuf, PipelineError> {
        let dataset = &self.config.dataset;
        info!(
            "[diabetes-lake:pipeline] fetching {} via {}",
            dataset.dataset_id,
            self.source.id()
        );
        let dir = self
            .source
            .fetch(&dataset.dataset_id, &dataset.download_dir)?;
        locate_file(&dir, &dataset.file_name)
    }

    /// Convert, upload, query, and normalize starting from a local file.
    pub fn ingest(&self, csv: &Path, date: NaiveDate) -> Result<IngestedData, PipelineError> {
        let converter =
            ColumnarConverter::new(self.config.dataset.clone(), self.config.storage.clone());
        let artifact = converter.convert_and_upload(csv, self.storage, date)?;

        let handle = QueryRunner::new(self.config.query.clone()).submit(self.engine)?;
        let succeeded = StatusPoller::new(self.config.poll.clone()).wait(self.engine, handle)?;
        let results = materialize(self.engine, &succeeded)?;
        let result_rows = results.row_count();
        let table = normalize(results.into_table()?, &self.config.schema)?;

        for line in table.preview(PREVIEW_ROWS) {
            info!("[diabetes-lake:pipeline] {line}");
        }
        for column in table.table().columns() {
            info!(
                "[diabetes-lake:pipeline] column {:<28} {}",
                column.name,
                column.data.kind()
            );
        }

        Ok(IngestedData {
            artifact,
            handle: succeeded.handle().clone(),
            poll_attempts: succeeded.attempts(),
            result_rows,
            table,
        })
    }

    /// Run every stage after acquisition for the given partition date.
    pub fn run_from_file(
        &self,
        csv: &Path,
        date: NaiveDate,
    ) -> Result<PipelineReport, PipelineError> {
        let ingested = self.ingest(csv, date)?;
        let training = ModelTrainer::new(self.config.training.clone()).run(&ingested.table)?;
        Ok(PipelineReport {
            coercion_warnings: ingested.table.warnings().len(),
            artifact: ingested.artifact,
            handle: ingested.handle,
            poll_attempts: ingested.poll_attempts,
            result_rows: ingested.result_rows,
            training,
        })
    }

    /// Full run partitioned under today's local date.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let csv = self.acquire()?;
        let report = self.run_from_file(&csv, Local::now().date_naive())?;
        info!(
            "[diabetes-lake:pipeline] finished: {} rows uploaded to {}, {} rows queried",
            report.artifact.row_count, report.artifact.key, report.result_rows
        );
        Ok(report)
    }
}
