use std::process::ExitCode;

use diabetes_lake::transport::aws::AwsContext;
use diabetes_lake::{KaggleSource, Pipeline, PipelineConfig, PipelineError, PipelineReport};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run() -> Result<PipelineReport, PipelineError> {
    let config = PipelineConfig::default().validated()?;
    let aws = AwsContext::load(&config.query.region)?;
    let storage = aws.s3();
    let engine = aws.athena();
    let source = KaggleSource::from_environment()?;
    Pipeline::new(config, &source, &storage, &engine)?.run()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => info!("[diabetes-lake] report\n{json}"),
                Err(err) => error!("[diabetes-lake] failed to render report: {err}"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("[diabetes-lake] run failed: {err}");
            ExitCode::FAILURE
        }
    }
}
