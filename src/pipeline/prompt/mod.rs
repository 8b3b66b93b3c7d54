//! Prompt assembly: role-structured templates with `{placeholder}` slots.
//!
//! Template syntax follows the usual format-string rules: `{name}` is a
//! placeholder, `{{` and `}}` are literal braces. Anything else is text.

pub mod convention;
pub mod exemplars;
pub mod assembler;

pub use convention::ChatConvention;
pub use exemplars::{exemplars_for, Exemplar};
pub use assembler::build;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::schema::Task;
use super::ConfigError;

/// Speaker role of one prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Runtime text for one invocation, keyed by placeholder name.
///
/// Borrows the document text; built fresh for every stage call.
#[derive(Debug, Clone, Default)]
pub struct Bindings<'a> {
    values: BTreeMap<&'a str, &'a str>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'a str, text: &'a str) -> Self {
        self.values.insert(name, text);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.values.keys().copied()
    }
}

/// A piece of template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Length of a `name}` run at the start of `rest`, if it is one.
fn placeholder_len(rest: &[u8]) -> Option<usize> {
    let len = rest
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    (len > 0 && rest.get(len) == Some(&b'}')).then_some(len)
}

/// Split a template into literal text and placeholders.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                out.push(Segment::Text(&template[literal_start..i]));
                out.push(Segment::Text("{"));
                i += 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                out.push(Segment::Text(&template[literal_start..i]));
                out.push(Segment::Text("}"));
                i += 2;
                literal_start = i;
            }
            b'{' => match placeholder_len(&bytes[i + 1..]) {
                Some(len) => {
                    out.push(Segment::Text(&template[literal_start..i]));
                    out.push(Segment::Placeholder(&template[i + 1..i + 1 + len]));
                    i += len + 2;
                    literal_start = i;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    out.push(Segment::Text(&template[literal_start..]));
    out.retain(|s| !matches!(s, Segment::Text("")));
    out
}

/// Placeholder names appearing in a template string.
pub fn placeholders(template: &str) -> BTreeSet<String> {
    segments(template)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.to_string()),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Role-structured prompt for one task, not yet flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub task: Task,
    pub convention: ChatConvention,
    pub messages: Vec<PromptMessage>,
    /// Placeholders that must be bound at invocation.
    pub input_variables: BTreeSet<String>,
}

impl PromptTemplate {
    pub fn new(task: Task, convention: ChatConvention, messages: Vec<PromptMessage>) -> Self {
        let input_variables = messages
            .iter()
            .flat_map(|m| placeholders(&m.content))
            .collect();
        Self {
            task,
            convention,
            messages,
            input_variables,
        }
    }

    /// Flatten into one instruction string using the model's chat framing.
    pub fn render(&self) -> RenderedPrompt {
        RenderedPrompt {
            task: self.task,
            text: self.convention.render(&self.messages),
            input_variables: self.input_variables.clone(),
        }
    }
}

/// A flattened template still carrying its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub task: Task,
    pub text: String,
    pub input_variables: BTreeSet<String>,
}

impl RenderedPrompt {
    /// Supplied names must equal the template's placeholder set exactly.
    pub fn check_bindings(&self, bindings: &Bindings<'_>) -> Result<(), ConfigError> {
        let supplied: BTreeSet<String> = bindings.names().map(str::to_string).collect();
        if supplied != self.input_variables {
            return Err(ConfigError::PlaceholderMismatch {
                expected: self.input_variables.iter().cloned().collect(),
                supplied: supplied.into_iter().collect(),
            });
        }
        Ok(())
    }

    /// Substitute bindings into the template. Bound text is inserted
    /// verbatim and never scanned for placeholders itself.
    pub fn format(&self, bindings: &Bindings<'_>) -> Result<String, ConfigError> {
        self.check_bindings(bindings)?;

        let extra: usize = bindings
            .names()
            .filter_map(|n| bindings.get(n))
            .map(str::len)
            .sum();
        let mut out = String::with_capacity(self.text.len() + extra);

        for segment in segments(&self.text) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    // check_bindings guarantees presence
                    out.push_str(bindings.get(name).unwrap_or_default());
                }
            }
        }
        Ok(out)
    }
}
