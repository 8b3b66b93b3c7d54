pub mod schema;
pub mod prompt;
pub mod sanitize;
pub mod decode;
pub mod backend;
pub mod models;
pub mod ingest;
pub mod stage;
pub mod record;
pub mod orchestrator;
pub mod diagnostic; // Per-document prompt/response dump (PATENT_MINER_DUMP_DIR)

pub use schema::{InputShape, Task};
pub use models::ModelKind;
pub use stage::ExtractionStage;
pub use record::{DocumentRecord, FieldOutcome, MergeError};
pub use orchestrator::{PipelineOrchestrator, RunReport, SkippedDocument};

use thiserror::Error;

use backend::BackendError;
use ingest::IngestError;

/// Fatal, pre-run configuration problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Placeholder mismatch: template expects {expected:?}, bindings supply {supplied:?}")]
    PlaceholderMismatch {
        expected: Vec<String>,
        supplied: Vec<String>,
    },

    #[error("Invalid stage list: {0}")]
    InvalidPipeline(String),

    #[error("Field '{field}' is written by both {first} and {second}")]
    FieldCollision {
        field: String,
        first: Task,
        second: Task,
    },

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Failure that aborts the processing of one document.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Backend failed during {task}: {source}")]
    Backend {
        task: Task,
        #[source]
        source: BackendError,
    },

    #[error("Record merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short label used in skip logs and run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Ingest(_) => "ingest",
            Self::Backend { .. } => "backend",
            Self::Merge(_) => "merge",
            Self::Io(_) => "io",
            Self::Serialize(_) => "serialize",
        }
    }
}
