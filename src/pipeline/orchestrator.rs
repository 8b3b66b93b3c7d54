//! Runs the stage chain over documents and directories.
//!
//! Per document: ingest → isolate the first example → remaining stages →
//! merge → persist. Documents are processed one at a time; a failure in one
//! never touches another's output.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::backend::{GenerationConfig, ModelBackend};
use super::decode::{ExtractionResult, TaskOutput};
use super::diagnostic;
use super::ingest::{self, collect_files, stem_of};
use super::models::ModelKind;
use super::record::DocumentRecord;
use super::schema::output_fields;
use super::stage::ExtractionStage;
use super::{ConfigError, InputShape, PipelineError, Task};
use crate::config::RetryPolicy;

/// A document that produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub path: PathBuf,
    /// Failure class: `ingest`, `backend`, `duplicate`, ...
    pub kind: String,
    pub reason: String,
}

/// Summary of one directory run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Files found under the input directory.
    pub discovered: usize,
    /// Artifacts written, in processing order.
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedDocument>,
}

impl RunReport {
    fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            discovered: 0,
            written: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, path: &Path, kind: &str, reason: String) {
        tracing::warn!(
            path = %path.display(),
            kind,
            reason = %reason,
            "Document skipped"
        );
        self.skipped.push(SkippedDocument {
            path: path.to_path_buf(),
            kind: kind.to_string(),
            reason,
        });
    }

    pub fn processed(&self) -> usize {
        self.written.len()
    }

    /// True when every discovered document produced an artifact.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Stages for `model` in pipeline order: example isolation, then the
/// selected tasks. An empty selection runs every task.
pub fn select_stages(
    model: ModelKind,
    tasks: &[Task],
    retry: RetryPolicy,
    generation: Option<&GenerationConfig>,
) -> Result<Vec<ExtractionStage>, ConfigError> {
    Task::ALL
        .into_iter()
        .filter(|task| *task == Task::ExampleIsolation || tasks.is_empty() || tasks.contains(task))
        .map(|task| {
            let stage = ExtractionStage::new(task, model)?.with_retry(retry);
            Ok(match generation {
                Some(config) => stage.with_generation(config.clone()),
                None => stage,
            })
        })
        .collect()
}

/// Ordered stage chain bound to one backend.
pub struct PipelineOrchestrator {
    stages: Vec<ExtractionStage>,
    backend: Box<dyn ModelBackend>,
}

impl PipelineOrchestrator {
    /// Validates the stage list: isolation first, no repeated task, and no
    /// output field written by two stages.
    pub fn new(
        stages: Vec<ExtractionStage>,
        backend: Box<dyn ModelBackend>,
    ) -> Result<Self, ConfigError> {
        validate_stages(&stages)?;
        Ok(Self { stages, backend })
    }

    pub fn stages(&self) -> &[ExtractionStage] {
        &self.stages
    }

    /// Run every stage on one document's text.
    ///
    /// Decode failures become failure markers and processing continues. A
    /// backend that stays down aborts the document.
    pub fn process_document(&self, source: &str, text: &str) -> Result<DocumentRecord, PipelineError> {
        let _span = tracing::info_span!("process_document", doc = %source).entered();
        let dump = diagnostic::dump_dir_for(source);

        let mut record = DocumentRecord::new(source);
        let mut example = String::new();

        for (index, stage) in self.stages.iter().enumerate() {
            let task = stage.task();
            let input = match task.input_shape() {
                InputShape::Patent => text,
                InputShape::Context => example.as_str(),
            };

            let run = stage.run(self.backend.as_ref(), input)?;
            if let Some(dir) = &dump {
                diagnostic::dump_stage(dir, index, task, &run.prompt, &run.raw);
            }

            match &run.result {
                ExtractionResult::Ok(TaskOutput::Text(isolated)) if task == Task::ExampleIsolation => {
                    tracing::debug!(chars = isolated.len(), "Example isolated");
                    example = isolated.clone();
                    record.set_example(isolated.clone());
                }
                result => record.apply(task, result)?,
            }
        }

        if let Some(dir) = &dump {
            diagnostic::dump_json(dir, "99-record.json", &record);
        }

        tracing::info!(
            fields = record.fields().len(),
            failed = record.failed_count(),
            "Document processed"
        );
        Ok(record)
    }

    /// Run only the isolation stage on one document.
    pub fn isolate_document(&self, source: &str, text: &str) -> Result<String, PipelineError> {
        let _span = tracing::info_span!("isolate_document", doc = %source).entered();
        let stage = &self.stages[0];
        let run = stage.run(self.backend.as_ref(), text)?;

        if let Some(dir) = diagnostic::dump_dir_for(source) {
            diagnostic::dump_stage(&dir, 0, stage.task(), &run.prompt, &run.raw);
        }

        match run.result {
            ExtractionResult::Ok(TaskOutput::Text(isolated)) => Ok(isolated),
            // Isolation is plain text; decoding cannot fail.
            _ => Ok(String::new()),
        }
    }

    /// Extract every document under `input` into `<output>/<stem>.json`.
    pub fn run_directory(&self, input: &Path, output: &Path) -> Result<RunReport, PipelineError> {
        self.run_each(input, output, "json", |stem, text| {
            let record = self.process_document(stem, text)?;
            Ok(record.to_json_pretty()?)
        })
    }

    /// Write the isolated first example of every document to `<output>/<stem>.txt`.
    pub fn isolate_directory(&self, input: &Path, output: &Path) -> Result<RunReport, PipelineError> {
        self.run_each(input, output, "txt", |stem, text| self.isolate_document(stem, text))
    }

    fn run_each<F>(
        &self,
        input: &Path,
        output: &Path,
        extension: &str,
        mut produce: F,
    ) -> Result<RunReport, PipelineError>
    where
        F: FnMut(&str, &str) -> Result<String, PipelineError>,
    {
        fs::create_dir_all(output)?;
        let files = collect_files(input)?;
        let out_dir = fs::canonicalize(output)?;
        let sources: HashSet<PathBuf> =
            files.iter().filter_map(|p| fs::canonicalize(p).ok()).collect();

        let mut report = RunReport::start();
        report.discovered = files.len();
        let _span = tracing::info_span!("run", run_id = %report.run_id).entered();
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            documents = files.len(),
            "Run started"
        );

        let mut seen = HashSet::new();
        for path in files {
            let stem = stem_of(&path);
            if !seen.insert(stem.clone()) {
                report.skip(&path, "duplicate", format!("stem '{stem}' already processed"));
                continue;
            }

            let file_name = format!("{stem}.{extension}");
            if sources.contains(&out_dir.join(&file_name)) {
                let reason = format!("{file_name} would replace an input document");
                report.skip(&path, "overwrite", reason);
                continue;
            }

            let text = match ingest::load_document(&path) {
                Ok(text) => text,
                Err(e) => {
                    report.skip(&path, "ingest", e.to_string());
                    continue;
                }
            };

            let artifact = produce(&stem, &text)
                .and_then(|contents| write_atomic(&output.join(&file_name), &contents));
            match artifact {
                Ok(target) => report.written.push(target),
                Err(e) => report.skip(&path, e.kind(), e.to_string()),
            }
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            processed = report.processed(),
            skipped = report.skipped.len(),
            "Run finished"
        );
        Ok(report)
    }
}

fn validate_stages(stages: &[ExtractionStage]) -> Result<(), ConfigError> {
    match stages.first() {
        None => return Err(ConfigError::InvalidPipeline("no stages".into())),
        Some(first) if first.task() != Task::ExampleIsolation => {
            return Err(ConfigError::InvalidPipeline(format!(
                "first stage must be {}, got {}",
                Task::ExampleIsolation,
                first.task()
            )));
        }
        Some(_) => {}
    }

    let mut tasks: Vec<Task> = Vec::with_capacity(stages.len());
    for stage in stages {
        let task = stage.task();
        if tasks.contains(&task) {
            return Err(ConfigError::InvalidPipeline(format!("duplicate stage {task}")));
        }
        tasks.push(task);
    }

    check_disjoint_fields(tasks.into_iter().map(|task| (task, output_fields(task))))
}

/// Each output field may be claimed by one task only.
fn check_disjoint_fields<'a>(
    claims: impl IntoIterator<Item = (Task, Vec<&'a str>)>,
) -> Result<(), ConfigError> {
    let mut owners: Vec<(&str, Task)> = Vec::new();
    for (task, fields) in claims {
        for field in fields {
            if let Some((_, first)) = owners.iter().find(|(name, _)| *name == field) {
                return Err(ConfigError::FieldCollision {
                    field: field.to_string(),
                    first: *first,
                    second: task,
                });
            }
            owners.push((field, task));
        }
    }
    Ok(())
}

/// Write through a temp file in the target directory, then rename, so an
/// interrupted run leaves no partial artifact.
fn write_atomic(target: &Path, contents: &str) -> Result<PathBuf, PipelineError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(target.to_path_buf())
}
