//! S3 and Athena adapters.
//!
//! The SDK clients are async; each adapter owns a current-thread Tokio runtime
//! and blocks on every call so the pipeline core stays sequential.

use std::path::Path;
use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_athena::Client as AthenaClient;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::constants::storage::ARTIFACT_CONTENT_TYPE;
use crate::data::{ExecutionStatus, ResultPage};
use crate::errors::PipelineError;
use crate::transport::{ObjectStorage, QueryEngine};
use crate::types::{PageToken, QueryHandle};

/// Shared runtime and SDK configuration for the AWS adapters.
#[derive(Clone)]
pub struct AwsContext {
    runtime: Arc<Runtime>,
    sdk_config: SdkConfig,
}

impl AwsContext {
    /// Load credentials and settings from the default provider chain, pinned
    /// to `region`.
    pub fn load(region: &str) -> Result<Self, PipelineError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        );
        Ok(Self {
            runtime: Arc::new(runtime),
            sdk_config,
        })
    }

    pub fn s3(&self) -> S3Storage {
        S3Storage {
            runtime: Arc::clone(&self.runtime),
            client: S3Client::new(&self.sdk_config),
        }
    }

    pub fn athena(&self) -> AthenaEngine {
        AthenaEngine {
            runtime: Arc::clone(&self.runtime),
            client: AthenaClient::new(&self.sdk_config),
        }
    }
}

/// [`ObjectStorage`] backed by S3.
pub struct S3Storage {
    runtime: Arc<Runtime>,
    client: S3Client,
}

impl ObjectStorage for S3Storage {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), PipelineError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|err| PipelineError::storage(key, err))?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .content_type(ARTIFACT_CONTENT_TYPE)
                .send()
                .await
                .map_err(|err| {
                    PipelineError::storage(
                        key,
                        format!("put s3://{bucket}/{key} failed: {}", err.into_service_error()),
                    )
                })?;
            debug!("[diabetes-lake:s3] stored s3://{bucket}/{key}");
            Ok(())
        })
    }
}

/// [`QueryEngine`] backed by Athena.
pub struct AthenaEngine {
    runtime: Arc<Runtime>,
    client: AthenaClient,
}

fn map_state(state: Option<&QueryExecutionState>, reason: Option<&str>) -> ExecutionStatus {
    let reason = reason.map(str::to_string);
    match state {
        Some(QueryExecutionState::Succeeded) => ExecutionStatus::Succeeded,
        Some(QueryExecutionState::Failed) => ExecutionStatus::Failed(reason),
        Some(QueryExecutionState::Cancelled) => ExecutionStatus::Cancelled(reason),
        // QUEUED, RUNNING, unknown future states, and a missing state are all
        // non-terminal.
        _ => ExecutionStatus::Running,
    }
}

impl QueryEngine for AthenaEngine {
    fn submit(
        &self,
        query: &str,
        database: &str,
        output_location: &str,
    ) -> Result<QueryHandle, PipelineError> {
        self.runtime.block_on(async {
            let output = self
                .client
                .start_query_execution()
                .query_string(query)
                .query_execution_context(
                    QueryExecutionContext::builder().database(database).build(),
                )
                .result_configuration(
                    ResultConfiguration::builder()
                        .output_location(output_location)
                        .build(),
                )
                .send()
                .await
                .map_err(|err| PipelineError::Submission(err.into_service_error().to_string()))?;
            output
                .query_execution_id()
                .map(QueryHandle::new)
                .ok_or_else(|| {
                    PipelineError::Submission("engine returned no query execution id".to_string())
                })
        })
    }

    fn status(&self, handle: &QueryHandle) -> Result<ExecutionStatus, PipelineError> {
        self.runtime.block_on(async {
            let output = self
                .client
                .get_query_execution()
                .query_execution_id(handle.as_str())
                .send()
                .await
                .map_err(|err| PipelineError::engine(handle, err.into_service_error()))?;
            let status = output
                .query_execution()
                .and_then(|execution| execution.status());
            Ok(map_state(
                status.and_then(|status| status.state()),
                status.and_then(|status| status.state_change_reason()),
            ))
        })
    }

    fn results_page(
        &self,
        handle: &QueryHandle,
        token: Option<&PageToken>,
    ) -> Result<ResultPage, PipelineError> {
        self.runtime.block_on(async {
            let output = self
                .client
                .get_query_results()
                .query_execution_id(handle.as_str())
                .set_next_token(token.cloned())
                .send()
                .await
                .map_err(|err| PipelineError::engine(handle, err.into_service_error()))?;
            let Some(result_set) = output.result_set() else {
                return Ok(ResultPage {
                    next_token: output.next_token().map(str::to_string),
                    ..ResultPage::default()
                });
            };
            let column_labels = result_set.result_set_metadata().map(|metadata| {
                metadata
                    .column_info()
                    .iter()
                    .map(|info| info.label().unwrap_or(info.name()).to_string())
                    .collect()
            });
            let rows = result_set
                .rows()
                .iter()
                .map(|row| {
                    row.data()
                        .iter()
                        .map(|datum| datum.var_char_value().map(str::to_string))
                        .collect()
                })
                .collect();
            Ok(ResultPage {
                column_labels,
                rows,
                next_token: output.next_token().map(str::to_string),
            })
        })
    }
}
