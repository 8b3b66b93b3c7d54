//! Per-document diagnostic dump: prompts, raw responses, final record.
//!
//! Disabled unless `PATENT_MINER_DUMP_DIR` is set.
//!
//! ```text
//! {dump_dir}/{stem}/
//!   00-example_isolation-prompt.txt
//!   00-example_isolation-response.txt
//!   01-composition-prompt.txt
//!   01-composition-response.txt
//!   ...
//!   99-record.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config;
use crate::pipeline::Task;

/// Dump directory for a document, or `None` if diagnostics are disabled.
pub fn dump_dir_for(stem: &str) -> Option<PathBuf> {
    let base = config::dump_dir()?;
    dump_dir_in(&base, stem)
}

/// Create `{base}/{stem}`. Returns `None` (with a warning) on failure;
/// a broken dump never blocks the pipeline.
pub fn dump_dir_in(base: &Path, stem: &str) -> Option<PathBuf> {
    let dir = base.join(stem);
    match fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Dump directory not created");
            None
        }
    }
}

/// Prompt and raw response of one stage.
pub fn dump_stage(dir: &Path, index: usize, task: Task, prompt: &str, response: &str) {
    write_dump(&dir.join(format!("{index:02}-{task}-prompt.txt")), prompt);
    write_dump(&dir.join(format!("{index:02}-{task}-response.txt")), response);
}

/// Pretty JSON of `value` under `dir`.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_dump(&path, &json),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Dump not serialized"),
    }
}

fn write_dump(path: &Path, contents: &str) {
    match fs::write(path, contents) {
        Ok(()) => tracing::debug!(path = %path.display(), bytes = contents.len(), "Dump written"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Dump not written"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dir_in_creates_document_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = dump_dir_in(tmp.path(), "CN114300742A").unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("CN114300742A"));
    }

    #[test]
    fn stage_files_are_numbered_by_task() {
        let tmp = tempfile::tempdir().unwrap();
        dump_stage(tmp.path(), 2, Task::Conductivity, "PROMPT", "{\"conductivity\": \"none\"}");

        let prompt = fs::read_to_string(tmp.path().join("02-conductivity-prompt.txt")).unwrap();
        let response =
            fs::read_to_string(tmp.path().join("02-conductivity-response.txt")).unwrap();
        assert_eq!(prompt, "PROMPT");
        assert!(response.contains("conductivity"));
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();
        dump_json(tmp.path(), "99-record.json", &serde_json::json!({"example": "Li2S"}));

        let content = fs::read_to_string(tmp.path().join("99-record.json")).unwrap();
        assert!(content.contains("\"example\": \"Li2S\""));
        assert!(content.contains('\n'));
    }

    #[test]
    fn write_failures_do_not_panic() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        dump_stage(bad_dir, 0, Task::ExampleIsolation, "prompt", "response");
        dump_json(bad_dir, "b.json", &"data");
    }
}
