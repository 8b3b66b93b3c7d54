//! Fine-tuning dataset export.
//!
//! Pairs each `<stem>.json` record with its sibling `<stem>.txt` example and
//! writes one chat-format JSONL line per pair:
//!
//! ```text
//! {"message":[{"role":"<instruction>"},{"user":"<text>"},{"assistant":"<target>"}]}
//! ```

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::pipeline::ingest::collect_files;
use crate::pipeline::schema::ABSENT_SENTINEL;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DatasetError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Which record field becomes the assistant target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetMode {
    Electrolyte,
    Precursors,
    Conductivity,
}

impl DatasetMode {
    pub fn label_field(&self) -> &'static str {
        match self {
            Self::Electrolyte => "electrolyte",
            Self::Precursors => "precursors",
            Self::Conductivity => "conductivity",
        }
    }

    pub fn system_message(&self) -> &'static str {
        match self {
            Self::Electrolyte => "Given a text from a patent describing how an electrolyte is \
synthesised, please extract information according to the following instructions. If the text \
specifies the proportion of the elements of the electrolyte (through an ICP reading or the \
chemical formula of the electrolyte), extract the element proportion as a dict whose keys are \
the elements in chemical formula and values their proportions. If the proportion of the \
elements is not present in the text, just return the string none.",
            Self::Precursors => "Given a text from a patent describing how an electrolyte is \
synthesised, please extract information according to the following instructions. If the text \
specifies the precursors of the electrolyte, extract them as a dict whose keys are the \
precursors in chemical formula and values their dosages (or the mass of the precursor used) \
in the reaction that synthesises the electrolyte. If the dosage of a precursor is not \
specified, set its value to none. If the precursors are not given, just return the string none.",
            Self::Conductivity => "Given a text from a patent describing how an electrolyte is \
synthesised, please extract information according to the following instructions. If the text \
specifies the conductivity of the electrolyte, return the conductivity in its original text. \
If the conductivity is not given in the text, just return the string none.",
        }
    }
}

/// Outcome of one export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetSummary {
    pub written: usize,
    /// Label files left out, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Assistant target: strings as-is, anything else as compact JSON.
pub fn target_text(label: &Value) -> Result<String, serde_json::Error> {
    match label {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other),
    }
}

/// One JSONL line for a text/label pair.
pub fn dataset_line(mode: DatasetMode, text: &str, label: &Value) -> Result<String, serde_json::Error> {
    let line = json!({
        "message": [
            { "role": mode.system_message() },
            { "user": text },
            { "assistant": target_text(label)? },
        ]
    });
    serde_json::to_string(&line)
}

/// Label for `mode` from a persisted record, or why it is unusable.
fn label_of(record: &Value, mode: DatasetMode) -> Result<Value, String> {
    let field = mode.label_field();
    match record.get(field) {
        None => Err(format!("field {field} missing")),
        Some(Value::Object(map)) if map.len() == 1 && map.contains_key("error") => {
            Err(format!("field {field} holds a failure marker"))
        }
        Some(Value::Null) => Ok(Value::String(ABSENT_SENTINEL.to_string())),
        Some(value) => Ok(value.clone()),
    }
}

/// Write dataset lines for every record under `input` to `out`.
pub fn write_dataset<W: Write>(
    input: &Path,
    mode: DatasetMode,
    out: &mut W,
) -> Result<DatasetSummary, DatasetError> {
    let files = collect_files(input).map_err(DatasetError::io(input))?;
    let mut summary = DatasetSummary::default();

    for label_path in files
        .iter()
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
    {
        let text_path = label_path.with_extension("txt");
        if !text_path.is_file() {
            skip(&mut summary, label_path, "no sibling .txt example".into());
            continue;
        }

        let raw = fs::read_to_string(label_path).map_err(DatasetError::io(label_path))?;
        let record: Value = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                skip(&mut summary, label_path, format!("invalid JSON: {e}"));
                continue;
            }
        };
        let label = match label_of(&record, mode) {
            Ok(label) => label,
            Err(reason) => {
                skip(&mut summary, label_path, reason);
                continue;
            }
        };

        let text = fs::read_to_string(&text_path).map_err(DatasetError::io(&text_path))?;
        let line = dataset_line(mode, &text, &label)?;
        writeln!(out, "{line}").map_err(DatasetError::io(label_path))?;
        summary.written += 1;
        tracing::debug!(path = %label_path.display(), "Dataset line written");
    }

    Ok(summary)
}

/// Export to a file at `output`.
pub fn export_dataset(
    input: &Path,
    mode: DatasetMode,
    output: &Path,
) -> Result<DatasetSummary, DatasetError> {
    let file = fs::File::create(output).map_err(DatasetError::io(output))?;
    let mut writer = BufWriter::new(file);
    let summary = write_dataset(input, mode, &mut writer)?;
    writer.flush().map_err(DatasetError::io(output))?;

    tracing::info!(
        output = %output.display(),
        mode = mode.label_field(),
        written = summary.written,
        skipped = summary.skipped.len(),
        "Dataset exported"
    );
    Ok(summary)
}

fn skip(summary: &mut DatasetSummary, path: &Path, reason: String) {
    tracing::warn!(path = %path.display(), reason = %reason, "Label skipped");
    summary.skipped.push((path.to_path_buf(), reason));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_pair(dir: &Path, stem: &str, record: &str, text: &str) {
        fs::write(dir.join(format!("{stem}.json")), record).unwrap();
        fs::write(dir.join(format!("{stem}.txt")), text).unwrap();
    }

    #[test]
    fn structured_label_is_serialized_json() {
        let label = json!({"Li": "6", "P": "1"});
        let line = dataset_line(DatasetMode::Electrolyte, "实施例1", &label).unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();

        let messages = parsed["message"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[0]["role"].as_str().unwrap().contains("proportion of the elements"));
        assert_eq!(messages[1]["user"], "实施例1");
        assert_eq!(messages[2]["assistant"], r#"{"Li":"6","P":"1"}"#);
        assert!(line.contains("实施例1"));
    }

    #[test]
    fn string_label_is_used_verbatim() {
        assert_eq!(target_text(&json!("none")).unwrap(), "none");
        assert_eq!(target_text(&json!("2.1 mS/cm")).unwrap(), "2.1 mS/cm");
    }

    #[test]
    fn writes_one_line_per_usable_pair() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(
            dir.path(),
            "CN1",
            r#"{"example": "x", "conductivity": "2.1 mS/cm"}"#,
            "Example 1 ... 2.1 mS/cm",
        );
        write_pair(dir.path(), "CN2", r#"{"example": "y", "conductivity": "none"}"#, "Example 1 ...");
        write_pair(
            dir.path(),
            "CN3",
            r#"{"example": "z", "conductivity": {"error": "no parseable payload"}}"#,
            "Example 1 ...",
        );
        fs::write(dir.path().join("CN4.json"), r#"{"conductivity": "none"}"#).unwrap();

        let mut out = Vec::new();
        let summary = write_dataset(dir.path(), DatasetMode::Conductivity, &mut out).unwrap();

        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped.len(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["message"][2]["assistant"], "2.1 mS/cm");
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["message"][2]["assistant"], "none");
    }

    #[test]
    fn missing_label_field_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "US1", r#"{"example": "x"}"#, "text");

        let mut out = Vec::new();
        let summary = write_dataset(dir.path(), DatasetMode::Precursors, &mut out).unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped[0].1, "field precursors missing");
        assert!(out.is_empty());
    }

    #[test]
    fn export_writes_file() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_pair(
            input.path(),
            "JP1",
            r#"{"example": "x", "precursors": {"Li2S": "0.5 g", "P2S5": "none"}}"#,
            "Li2S (0.5 g) and P2S5",
        );

        let path = output.path().join("dataset.jsonl");
        let summary = export_dataset(input.path(), DatasetMode::Precursors, &path).unwrap();
        assert_eq!(summary.written, 1);

        let content = fs::read_to_string(&path).unwrap();
        let line: Value = serde_json::from_str(content.trim_end()).unwrap();
        let target: Value =
            serde_json::from_str(line["message"][2]["assistant"].as_str().unwrap()).unwrap();
        assert_eq!(target["P2S5"], "none");
    }
}
