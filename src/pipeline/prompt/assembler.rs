use super::convention::ChatConvention;
use super::exemplars::exemplars_for;
use super::{PromptMessage, PromptTemplate, Role};
use crate::pipeline::schema::{escape_braces, render_instructions, InputShape, Task};

const ISOLATION_SYSTEM: &str = "Given the full text of a patent about how an electrolyte is produced. \
There are several examples of how the electrolyte is produced given in the text. \
Please extract the original text of the first example. \
Reply with the text of that example only, copied verbatim.";

const EXISTENCE_SYSTEM: &str = "Given the full text of a patent, decide whether it describes \
how a solid electrolyte is synthesised.";

const SYNTHESIS_PREAMBLE: &str = "Given a text from a patent describing how an electrolyte is \
synthesised, please extract information according to the following instructions.";

const STRUCTURE_PREAMBLE: &str = "Given the full text of a patent about a solid electrolyte, \
please extract the crystal structure of the electrolyte according to the following instructions.";

/// Task-specific guidance placed before the format instructions.
fn task_guidance(task: Task) -> &'static str {
    match task {
        Task::ExampleIsolation => "",
        Task::ExistenceCheck => "",
        Task::Composition => "If the text specifies the proportion of the elements of the \
electrolyte (through an ICP reading or the chemical formula of the electrolyte), extract the \
element proportion as a dict whose keys are the elements and values their proportions. \
If the proportion is not present in the text, answer none.",
        Task::PrecursorSet => "If the text specifies the precursors of the electrolyte, extract \
them as a dict whose keys are the precursors in chemical formula and values their dosages \
(or the mass used) in the reaction. If the dosage of a precursor is not specified, set its \
value to none. If no precursors are given, answer none.",
        Task::Conductivity => "If the text specifies the conductivity of the electrolyte, return \
the conductivity in its original text. If the conductivity is not given, answer none.",
        Task::SynthesisMethod => "Classify the synthesis route and collect the numeric process \
conditions (temperatures, durations, milling speeds). If the route is not described, answer none.",
        Task::CrystalStructure => "If the text reports the crystal system or the space group of \
the electrolyte (for example from X-ray diffraction), extract them. Use none for anything \
not reported.",
    }
}

fn system_content(task: Task) -> String {
    let preamble = match task {
        Task::ExampleIsolation => return ISOLATION_SYSTEM.to_string(),
        Task::ExistenceCheck => EXISTENCE_SYSTEM,
        Task::CrystalStructure => STRUCTURE_PREAMBLE,
        _ => SYNTHESIS_PREAMBLE,
    };

    let mut content = String::from(preamble);
    let guidance = task_guidance(task);
    if !guidance.is_empty() {
        content.push(' ');
        content.push_str(guidance);
    }

    let exemplars = exemplars_for(task);
    if !exemplars.is_empty() {
        content.push_str("\n\nExamples:\n");
        for ex in exemplars {
            content.push_str(&format!(
                "\ntext: {}\noutput: {}\n",
                escape_braces(ex.context),
                escape_braces(ex.output)
            ));
        }
    }

    if let Some(schema) = task.schema() {
        content.push_str("\n\n");
        content.push_str(&render_instructions(schema));
    }
    content
}

fn user_content(shape: InputShape) -> String {
    match shape {
        InputShape::Patent => "the full text:\n\n{patent}".to_string(),
        InputShape::Context => "the text:\n\n{context}".to_string(),
    }
}

/// Assemble the role-structured template for a task.
///
/// The single user-turn placeholder is fixed by the task's input shape.
pub fn build(task: Task, convention: ChatConvention) -> PromptTemplate {
    let messages = vec![
        PromptMessage::new(Role::System, system_content(task)),
        PromptMessage::new(Role::User, user_content(task.input_shape())),
    ];
    PromptTemplate::new(task, convention, messages)
}
