use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

use learning_needs_engine::config::Config;
use learning_needs_engine::error::ValidationError;
use learning_needs_engine::logging::{init_tracing, LogSettings};
use learning_needs_engine::needs::{AnalysisContext, InteractionSample, NeedsEngine};
use learning_needs_engine::services::HttpInferenceProvider;

#[derive(Debug, Error)]
enum CliError {
    #[error("usage: learning-needs-engine <sample.json> [age_years] [grade_level]")]
    Usage,
    #[error("invalid {name} `{value}`")]
    InvalidArgument { name: &'static str, value: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("sample is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sample rejected: {0}")]
    Validation(#[from] ValidationError),
}

struct Args {
    sample_path: PathBuf,
    context: AnalysisContext,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, CliError> {
    let sample_path = args.next().map(PathBuf::from).ok_or(CliError::Usage)?;
    let mut context = AnalysisContext::default();
    if let Some(age) = args.next() {
        context.age_years = age.parse().map_err(|_| CliError::InvalidArgument {
            name: "age_years",
            value: age,
        })?;
    }
    if let Some(grade) = args.next() {
        context.grade_level = grade.parse().map_err(|_| CliError::InvalidArgument {
            name: "grade_level",
            value: grade,
        })?;
    }
    Ok(Args {
        sample_path,
        context,
    })
}

async fn run(config: Config, args: Args) -> Result<(), CliError> {
    let raw = tokio::fs::read_to_string(&args.sample_path)
        .await
        .map_err(|source| CliError::Read {
            path: args.sample_path.clone(),
            source,
        })?;
    let sample = InteractionSample::from_value(serde_json::from_str(&raw)?)?;

    let provider = HttpInferenceProvider::new(config.inference.clone());
    if !provider.is_available() {
        tracing::warn!("INFERENCE_API_ENDPOINT not set, detection will run rule-only");
    }
    let engine = NeedsEngine::new(config.needs, provider, config.inference.timeout);

    let response = engine.detect(&sample, &args.context).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level, &LogSettings::from_env());

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(config, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "needs detection failed");
            ExitCode::FAILURE
        }
    }
}
