//! Command-line surface: `extract`, `isolate`, `dataset`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::SecretString;

use crate::config::{self, RetryPolicy};
use crate::dataset::{self, DatasetMode};
use crate::pipeline::backend::{EndpointBackend, GenerationConfig, ModelBackend, OllamaBackend};
use crate::pipeline::orchestrator::{select_stages, PipelineOrchestrator, RunReport};
use crate::pipeline::{ConfigError, ModelKind, Task};

/// Hosted inference API used when no endpoint URL is given.
const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

#[derive(Parser)]
#[command(name = "patent-miner")]
#[command(about = "Extract solid-electrolyte synthesis facts from patents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full extraction pipeline, one JSON record per document
    Extract {
        /// Directory of .html/.htm/.txt/.pdf patents (searched recursively)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for <stem>.json records
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Also write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Comma-separated tasks to run after example isolation (default: all),
        /// e.g. `composition,conductivity`
        #[arg(long, value_delimiter = ',')]
        tasks: Vec<Task>,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Only isolate the first example of each patent into <stem>.txt
    Isolate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "examples_out")]
        output: PathBuf,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Build a fine-tuning JSONL dataset from records and isolated examples
    Dataset {
        /// Directory holding <stem>.json records with sibling <stem>.txt files
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "dataset.jsonl")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = DatasetMode::Electrolyte)]
        mode: DatasetMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Local Ollama instance
    Ollama,
    /// Hosted text-generation-inference endpoint
    Endpoint,
}

/// Model and backend selection shared by the pipeline commands.
#[derive(Args)]
pub struct BackendArgs {
    #[arg(long, value_enum, env = "PATENT_MINER_MODEL", default_value_t = ModelKind::Qwen2)]
    pub model: ModelKind,

    #[arg(long, value_enum, env = "PATENT_MINER_BACKEND", default_value_t = BackendKind::Ollama)]
    pub backend: BackendKind,

    #[arg(long, env = "PATENT_MINER_OLLAMA_URL", default_value = config::DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Ollama tag to use instead of the model's default
    #[arg(long, env = "PATENT_MINER_OLLAMA_TAG")]
    pub ollama_tag: Option<String>,

    /// Endpoint URL; defaults to the hosted inference API for the model
    #[arg(long, env = "PATENT_MINER_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Bearer token for the endpoint
    #[arg(long, env = "PATENT_MINER_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, env = "PATENT_MINER_TIMEOUT_SECS", default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    #[arg(long, env = "PATENT_MINER_MAX_RETRIES", default_value_t = config::DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Sample with the model's temperature/top_p instead of greedy decoding
    #[arg(long)]
    pub sample: bool,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub context_length: Option<u32>,
}

impl BackendArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, RetryPolicy::default().backoff)
    }

    pub fn generation_config(&self) -> GenerationConfig {
        let mut config = self.model.generation_config();
        config.deterministic = !self.sample;
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = Some(max_tokens);
        }
        if let Some(context_length) = self.context_length {
            config.context_length = Some(context_length);
        }
        config
    }

    /// Endpoint URL and whether it is the hosted API (which needs a token).
    fn endpoint_url(&self) -> (String, bool) {
        match &self.endpoint_url {
            Some(url) => (url.clone(), false),
            None => (format!("{HF_INFERENCE_URL}/{}", self.model.hub_id()), true),
        }
    }

    pub fn build_backend(&self) -> Result<Box<dyn ModelBackend>> {
        match self.backend {
            BackendKind::Ollama => {
                let tag = self.ollama_tag.as_deref().unwrap_or(self.model.ollama_tag());
                let backend = OllamaBackend::new(&self.ollama_url, tag, self.timeout_secs)?;
                match backend.is_model_available() {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        model = tag,
                        "Model not found in Ollama; pull it with `ollama pull {tag}`"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Could not list Ollama models"),
                }
                Ok(Box::new(backend))
            }
            BackendKind::Endpoint => {
                let (url, hosted) = self.endpoint_url();
                let token = self.api_token.clone().map(SecretString::from);
                if hosted && token.is_none() {
                    return Err(ConfigError::MissingCredential("PATENT_MINER_API_TOKEN").into());
                }
                Ok(Box::new(EndpointBackend::new(&url, token, self.timeout_secs)?))
            }
        }
    }

    fn orchestrator(&self, tasks: &[Task]) -> Result<PipelineOrchestrator> {
        let generation = self.generation_config();
        let stages = select_stages(self.model, tasks, self.retry_policy(), Some(&generation))?;
        let backend = self.build_backend()?;
        let backend_name = backend.name().to_string();
        let pipeline = PipelineOrchestrator::new(stages, backend)?;
        tracing::info!(
            model = self.model.as_str(),
            backend = %backend_name,
            stages = pipeline.stages().len(),
            deterministic = generation.deterministic,
            "Pipeline ready"
        );
        Ok(pipeline)
    }
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Extract {
            input,
            output,
            report,
            tasks,
            backend,
        } => {
            let pipeline = backend.orchestrator(&tasks)?;
            let summary = pipeline
                .run_directory(&input, &output)
                .with_context(|| format!("extracting {}", input.display()))?;
            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
                    .with_context(|| format!("writing report {}", path.display()))?;
            }
            print_summary(&summary);
            Ok(exit_code(&summary))
        }
        Command::Isolate {
            input,
            output,
            backend,
        } => {
            let pipeline = backend.orchestrator(&[Task::ExampleIsolation])?;
            let summary = pipeline
                .isolate_directory(&input, &output)
                .with_context(|| format!("isolating examples in {}", input.display()))?;
            print_summary(&summary);
            Ok(exit_code(&summary))
        }
        Command::Dataset {
            input,
            output,
            mode,
        } => {
            let summary = dataset::export_dataset(&input, mode, &output)?;
            println!(
                "{} lines written to {} ({} skipped)",
                summary.written,
                output.display(),
                summary.skipped.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(report: &RunReport) {
    let elapsed = report
        .finished_at
        .map(|end| (end - report.started_at).to_std().unwrap_or(Duration::ZERO))
        .unwrap_or(Duration::ZERO);
    println!(
        "run {}: {} of {} documents written, {} skipped in {:.1}s",
        report.run_id,
        report.processed(),
        report.discovered,
        report.skipped.len(),
        elapsed.as_secs_f64()
    );
    for skipped in &report.skipped {
        println!("  skipped {} [{}]: {}", skipped.path.display(), skipped.kind, skipped.reason);
    }
}

/// Non-zero when any document was skipped.
fn exit_code(report: &RunReport) -> ExitCode {
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
