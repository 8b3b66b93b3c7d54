//! Schema registry: the typed output contract of every extraction task.
//!
//! Schemas are static data. Each task maps to a fixed list of fields with a
//! semantic type and a description that is shown to the model verbatim.

pub mod registry;
pub mod instructions;

pub use registry::*;
pub use instructions::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Literal the model uses to say "the text does not contain this".
pub const ABSENT_SENTINEL: &str = "none";

/// One kind of extraction the pipeline knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    ExampleIsolation,
    ExistenceCheck,
    Composition,
    PrecursorSet,
    Conductivity,
    SynthesisMethod,
    CrystalStructure,
}

impl Task {
    pub const ALL: [Task; 7] = [
        Task::ExampleIsolation,
        Task::ExistenceCheck,
        Task::Composition,
        Task::PrecursorSet,
        Task::Conductivity,
        Task::SynthesisMethod,
        Task::CrystalStructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExampleIsolation => "example_isolation",
            Self::ExistenceCheck => "existence_check",
            Self::Composition => "composition",
            Self::PrecursorSet => "precursor_set",
            Self::Conductivity => "conductivity",
            Self::SynthesisMethod => "synthesis_method",
            Self::CrystalStructure => "crystal_structure",
        }
    }

    /// Which text the task reads: the whole patent or the isolated example.
    pub fn input_shape(&self) -> InputShape {
        match self {
            Self::ExampleIsolation | Self::ExistenceCheck | Self::CrystalStructure => {
                InputShape::Patent
            }
            Self::Composition
            | Self::PrecursorSet
            | Self::Conductivity
            | Self::SynthesisMethod => InputShape::Context,
        }
    }

    /// The typed contract, or `None` for plain-text tasks.
    pub fn schema(&self) -> Option<&'static Schema> {
        schema_for(*self)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownTask(s.to_string()))
    }
}

/// Binding shape of a task's input placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    /// Full source text, bound to `{patent}`.
    Patent,
    /// Previously isolated excerpt, bound to `{context}`.
    Context,
}

impl InputShape {
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Patent => "patent",
            Self::Context => "context",
        }
    }
}

/// Semantic type of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    StringMap,
    NumberMap,
    Enum(&'static [&'static str]),
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringMap => "string_map",
            Self::NumberMap => "number_map",
            Self::Enum(_) => "enum",
        }
    }
}

/// A named field of a task's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub description: &'static str,
    /// Whether `"none"` is an accepted value meaning "not in the text".
    pub allows_absent: bool,
}

/// Output contract of one task.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub task: Task,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}
