//! Query execution stage.

use tracing::info;

use crate::config::QueryConfig;
use crate::errors::PipelineError;
use crate::transport::QueryEngine;
use crate::types::QueryHandle;

/// Submits the configured query; the query text is never a runtime input.
pub struct QueryRunner {
    config: QueryConfig,
}

impl QueryRunner {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    /// Submit once. Rejections surface as `Submission` errors without retry.
    pub fn submit(&self, engine: &dyn QueryEngine) -> Result<QueryHandle, PipelineError> {
        let handle = engine
            .submit(
                &self.config.query,
                &self.config.database,
                &self.config.output_location,
            )
            .map_err(|err| match err {
                PipelineError::Submission(_) => err,
                other => PipelineError::Submission(other.to_string()),
            })?;
        info!(
            "[diabetes-lake:query] submitted to database '{}' as {handle}",
            self.config.database
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::ScriptedQueryEngine;

    #[test]
    fn submit_forwards_configured_query() {
        let engine = ScriptedQueryEngine::new("exec-1");
        let runner = QueryRunner::new(QueryConfig::default());
        let handle = runner.submit(&engine).unwrap();
        assert_eq!(handle.as_str(), "exec-1");
        let submitted = engine.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].query, "SELECT * FROM dados_analise_diabetes");
        assert_eq!(submitted[0].database, "fiap_tech2_diabetes");
        assert!(submitted[0].output_location.ends_with("/Dados_diabetes_temp"));
    }

    #[test]
    fn rejection_is_not_retried() {
        let engine = ScriptedQueryEngine::new("exec-1").rejecting("access denied");
        let runner = QueryRunner::new(QueryConfig::default());
        let err = runner.submit(&engine).unwrap_err();
        assert!(matches!(err, PipelineError::Submission(ref msg) if msg == "access denied"));
        assert_eq!(engine.submissions().len(), 1);
    }
}
