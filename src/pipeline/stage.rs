//! One extraction stage: bind input, call the backend, decode.

use crate::config::RetryPolicy;

use super::backend::{BackendError, GenerationConfig, ModelBackend};
use super::decode::{decode, ExtractionResult};
use super::models::ModelKind;
use super::prompt::{self, Bindings, RenderedPrompt};
use super::sanitize::{sanitize_model_output, truncate_at_stop};
use super::{ConfigError, PipelineError, Task};

/// Everything one stage invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun {
    /// Fully bound prompt sent to the backend.
    pub prompt: String,
    /// Backend response before cleanup.
    pub raw: String,
    pub result: ExtractionResult,
}

/// A task bound to a model: the template is assembled and rendered once,
/// then reused for every document.
#[derive(Debug, Clone)]
pub struct ExtractionStage {
    task: Task,
    model: ModelKind,
    prompt: RenderedPrompt,
    generation: GenerationConfig,
    retry: RetryPolicy,
}

impl ExtractionStage {
    pub fn new(task: Task, model: ModelKind) -> Result<Self, ConfigError> {
        let prompt = prompt::build(task, model.convention()).render();
        // The only placeholder must be the one the task's shape binds.
        prompt.check_bindings(&Bindings::new().with(task.input_shape().placeholder(), ""))?;

        Ok(Self {
            task,
            model,
            prompt,
            generation: model.generation_config(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn task(&self) -> Task {
        self.task
    }

    /// Bind `input_text` to the task's placeholder.
    pub fn format_prompt(&self, input_text: &str) -> Result<String, ConfigError> {
        let bindings = Bindings::new().with(self.task.input_shape().placeholder(), input_text);
        self.prompt.format(&bindings)
    }

    /// Run the stage on one input. A decode failure is returned as a value;
    /// only an exhausted backend is an error.
    pub fn run(&self, backend: &dyn ModelBackend, input_text: &str) -> Result<StageRun, PipelineError> {
        let prompt = self.format_prompt(input_text)?;

        let raw = self
            .generate_with_retry(backend, &prompt)
            .map_err(|source| PipelineError::Backend {
                task: self.task,
                source,
            })?;

        let stops: Vec<&str> = self.generation.stop.iter().map(String::as_str).collect();
        let cleaned = sanitize_model_output(truncate_at_stop(&raw, &stops));
        let result = decode(self.task, &cleaned);

        if let ExtractionResult::DecodeFailure { reason, .. } = &result {
            tracing::warn!(
                task = self.task.as_str(),
                reason = %reason,
                "Model output did not match schema"
            );
        }

        Ok(StageRun {
            prompt,
            raw,
            result,
        })
    }

    /// Call the backend, retrying transient failures with linear backoff.
    fn generate_with_retry(
        &self,
        backend: &dyn ModelBackend,
        prompt: &str,
    ) -> Result<String, BackendError> {
        let attempts = self.retry.total_attempts();
        let mut attempt = 1;

        loop {
            match backend.generate(prompt, &self.generation) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        task = self.task.as_str(),
                        model = self.model.as_str(),
                        backend = backend.name(),
                        attempt,
                        error = %e,
                        "Backend call failed, retrying"
                    );
                    let delay = self.retry.delay_for(attempt);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
