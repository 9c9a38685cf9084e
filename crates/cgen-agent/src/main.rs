use std::path::PathBuf;
use std::process::ExitCode;

use cgen_agent::telemetry::{write_summary, RunSummary};
use cgen_agent::{prepare, CodegenError, GeminiGenerator, LoopConfig};
use clap::Parser;
use tracing::{error, info};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate C code with Gemini and iterate until it compiles", long_about = None)]
struct Args {
    /// Initial instruction sent to the model
    #[arg(long)]
    prompt: Option<String>,

    /// Attempt ceiling (overrides CGEN_MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Compiler executable (overrides CGEN_COMPILER)
    #[arg(long)]
    compiler: Option<String>,

    /// Where extracted source is written (overrides CGEN_SOURCE_PATH)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Compiled artifact path (overrides CGEN_ARTIFACT_PATH)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Gemini model id (overrides CGEN_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Gemini REST base URL (overrides CGEN_API_BASE)
    #[arg(long)]
    api_base: Option<String>,

    /// Overwrite this file with each raw response body (overrides CGEN_RESPONSE_LOG)
    #[arg(long)]
    response_log: Option<PathBuf>,

    /// Write a JSON run summary here when the run ends
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Kill the compiler after this many seconds (overrides CGEN_COMPILE_TIMEOUT_SECS)
    #[arg(long)]
    compile_timeout: Option<u64>,

    /// HTTP timeout per generation request (overrides CGEN_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    request_timeout: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut LoopConfig) {
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        if let Some(max) = self.max_attempts {
            config.max_attempts = max;
        }
        if let Some(cc) = &self.compiler {
            config.compiler = cc.clone();
        }
        if let Some(path) = &self.source {
            config.source_path = path.clone();
        }
        if let Some(path) = &self.output {
            config.artifact_path = path.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(url) = &self.api_base {
            config.api_base = url.clone();
        }
        if self.response_log.is_some() {
            config.response_log = self.response_log.clone();
        }
        if self.summary.is_some() {
            config.summary_path = self.summary.clone();
        }
        if self.compile_timeout.is_some() {
            config.compile_timeout_secs = self.compile_timeout;
        }
        if let Some(secs) = self.request_timeout {
            config.request_timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match LoopConfig::from_env() {
        Ok(mut config) => {
            args.apply(&mut config);
            config
        }
        Err(e) => {
            let mut fallback = LoopConfig::default();
            args.apply(&mut fallback);
            record_setup_failure(&fallback, &e);
            return fail(e);
        }
    };

    info!(
        model = %config.model,
        compiler = %config.compiler,
        max_attempts = config.max_attempts,
        "cgen starting"
    );

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(e: CodegenError) -> ExitCode {
    error!(kind = %e.kind(), "{e}");
    eprintln!("Error: {e}");
    ExitCode::from(e.exit_code())
}

/// Runs rejected before the loop starts still leave a summary when asked for.
fn record_setup_failure(config: &LoopConfig, error: &CodegenError) {
    if let Some(path) = &config.summary_path {
        let summary = RunSummary::setup_failure(error, &config.model, &config.compiler);
        write_summary(&summary, path);
    }
}

async fn run(config: &LoopConfig) -> Result<(), CodegenError> {
    let prepared = prepare(config, |k| std::env::var(k).ok(), |cfg, key| {
        Ok(GeminiGenerator::new(cfg, key)?)
    });
    let mut feedback = match prepared {
        Ok(feedback) => feedback,
        Err(e) => {
            record_setup_failure(config, &e);
            return Err(e);
        }
    };

    let result = feedback.run().await;
    info!(path = %feedback.path_summary(), "Loop finished");

    if let Some(path) = &config.summary_path {
        let summary = RunSummary::capture(&feedback, &result, &config.model, &config.compiler);
        write_summary(&summary, path);
    }

    let success = result?;
    println!(
        "Successfully generated and compiled code after {} attempt(s): {} -> {}",
        success.attempts,
        success.source_path.display(),
        success.artifact_path.display()
    );
    Ok(())
}
